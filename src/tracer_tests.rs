#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::bitmap::ImageData;

    fn solid_image(width: u32, height: u32, gray: u8) -> ImageData {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[gray, gray, gray, 255]);
        }
        ImageData::from_raw_rgba(width, height, &data)
    }

    /// White canvas with a centered dark square.
    fn square_image(size: u32, square: u32) -> ImageData {
        let margin = (size - square) / 2;
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let inside = x >= margin && x < margin + square && y >= margin && y < margin + square;
                let gray = if inside { 0 } else { 255 };
                data.extend_from_slice(&[gray, gray, gray, 255]);
            }
        }
        ImageData::from_raw_rgba(size, size, &data)
    }

    #[test]
    fn test_unloaded_tracer_errors() {
        let mut tracer = Tracer::new();
        assert!(matches!(tracer.get_svg(), Err(Error::NotLoaded)));
        assert!(matches!(tracer.get_path_tag(None), Err(Error::NotLoaded)));
        assert!(matches!(tracer.get_symbol("id"), Err(Error::NotLoaded)));
        assert!(matches!(tracer.histogram(), Err(Error::NotLoaded)));
    }

    #[test]
    fn test_black_image_single_path() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(2, 2, 0));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.starts_with(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2" viewBox="0 0 2 2" version="1.1">"#
        ));
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains(r#"fill="black""#));
        assert!(svg.contains(r#"fill-rule="evenodd""#));
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn test_white_image_has_no_paths() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(2, 2, 255));
        let svg = tracer.get_svg().unwrap();
        assert!(!svg.contains("<path"));
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn test_white_on_black_inverts_selection() {
        let mut params = TraceParams {
            black_on_white: false,
            ..TraceParams::default()
        };
        let mut tracer = Tracer::with_params(params.clone()).unwrap();
        tracer.load_image(&solid_image(2, 2, 0));
        // Tracing light pixels over a black image finds nothing.
        assert!(!tracer.get_svg().unwrap().contains("<path"));

        params.black_on_white = true;
        tracer.set_parameters(params).unwrap();
        assert!(tracer.get_svg().unwrap().contains("<path"));
    }

    #[test]
    fn test_auto_color_resolution() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(2, 2, 0));
        assert!(tracer.get_svg().unwrap().contains(r#"fill="black""#));

        let mut tracer = Tracer::with_params(TraceParams {
            black_on_white: false,
            ..TraceParams::default()
        })
        .unwrap();
        tracer.load_image(&solid_image(2, 2, 200));
        assert!(tracer.get_svg().unwrap().contains(r#"fill="white""#));
    }

    #[test]
    fn test_background_rect() {
        let mut tracer = Tracer::with_params(TraceParams {
            background: Fill::from("#00ff00"),
            ..TraceParams::default()
        })
        .unwrap();
        tracer.load_image(&solid_image(2, 2, 0));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.contains(r##"<rect x="0" y="0" width="100%" height="100%" fill="#00ff00"/>"##));
    }

    #[test]
    fn test_fill_override() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(2, 2, 0));
        let tag = tracer.get_path_tag(Some("tomato")).unwrap();
        assert!(tag.contains(r#"fill="tomato""#));
    }

    #[test]
    fn test_symbol_form() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(2, 2, 0));
        let symbol = tracer.get_symbol("glyph").unwrap();
        assert!(symbol.starts_with(r#"<symbol viewBox="0 0 2 2" id="glyph">"#));
        assert!(symbol.ends_with("</symbol>"));
        assert!(!symbol.contains("fill=\""));
        assert!(!symbol.contains("<rect"));
    }

    #[test]
    fn test_output_dimensions_scale_coordinates() {
        let mut tracer = Tracer::with_params(TraceParams {
            width: Some(4),
            height: Some(4),
            ..TraceParams::default()
        })
        .unwrap();
        tracer.load_image(&solid_image(2, 2, 0));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.contains(r#"width="4" height="4" viewBox="0 0 4 4""#));
        // The square's far corner lands at 4 after scaling.
        assert!(svg.contains('4'));
    }

    #[test]
    fn test_determinism() {
        let image = square_image(20, 10);
        let mut first = Tracer::new();
        first.load_image(&image);
        let mut second = Tracer::new();
        second.load_image(&image);
        assert_eq!(first.get_svg().unwrap(), second.get_svg().unwrap());
    }

    #[test]
    fn test_render_twice_processes_once() {
        let mut tracer = Tracer::new();
        tracer.load_image(&square_image(20, 10));
        let first = tracer.get_svg().unwrap();
        assert!(tracer.is_processed());
        let second = tracer.get_svg().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_geometry_parameter_change_invalidates() {
        let mut tracer = Tracer::new();
        tracer.load_image(&square_image(20, 10));
        tracer.get_svg().unwrap();
        assert!(tracer.is_processed());

        // Color does not affect geometry.
        let mut params = tracer.params().clone();
        params.color = Fill::from("red");
        tracer.set_parameters(params).unwrap();
        assert!(tracer.is_processed());

        let mut params = tracer.params().clone();
        params.turd_size = 50;
        tracer.set_parameters(params).unwrap();
        assert!(!tracer.is_processed());
    }

    #[test]
    fn test_set_identical_parameters_is_noop() {
        let mut tracer = Tracer::new();
        tracer.load_image(&square_image(20, 10));
        tracer.get_svg().unwrap();
        let params = tracer.params().clone();
        tracer.set_parameters(params).unwrap();
        assert!(tracer.is_processed());
    }

    #[test]
    fn test_parameter_validation() {
        assert!(matches!(
            Tracer::with_params(TraceParams {
                alpha_max: 2.0,
                ..TraceParams::default()
            }),
            Err(Error::InvalidParameter { field: "alpha_max", .. })
        ));
        assert!(matches!(
            Tracer::with_params(TraceParams {
                opt_tolerance: 0.0,
                ..TraceParams::default()
            }),
            Err(Error::InvalidParameter { field: "opt_tolerance", .. })
        ));
        assert!(matches!(
            Tracer::with_params(TraceParams {
                threshold: Threshold::Value(300.0),
                ..TraceParams::default()
            }),
            Err(Error::InvalidParameter { field: "threshold", .. })
        ));
    }

    #[test]
    fn test_threshold_auto_serde_round_trip() {
        let auto: Threshold = serde_json::from_str("-1.0").unwrap();
        assert_eq!(auto, Threshold::Auto);
        let fixed: Threshold = serde_json::from_str("128.0").unwrap();
        assert_eq!(fixed, Threshold::Value(128.0));
        assert_eq!(serde_json::to_string(&Threshold::Auto).unwrap(), "-1.0");
    }

    #[test]
    fn test_superseded_load() {
        let mut tracer = Tracer::new();
        let stale = tracer.begin_load();
        let _current = tracer.begin_load();
        assert!(matches!(
            tracer.complete_load(stale, &solid_image(2, 2, 0)),
            Err(Error::Superseded)
        ));
        assert!(!tracer.is_loaded());
    }

    #[test]
    fn test_complete_load_with_current_token() {
        let mut tracer = Tracer::new();
        let token = tracer.begin_load();
        tracer.complete_load(token, &solid_image(2, 2, 0)).unwrap();
        assert!(tracer.is_loaded());
        assert!(tracer.get_svg().unwrap().contains("<path"));
    }

    #[test]
    fn test_load_image_supersedes_pending_token() {
        let mut tracer = Tracer::new();
        let token = tracer.begin_load();
        tracer.load_image(&solid_image(2, 2, 255));
        assert!(matches!(
            tracer.complete_load(token, &solid_image(2, 2, 0)),
            Err(Error::Superseded)
        ));
    }

    #[test]
    fn test_threshold_monotonicity() {
        // Raising the threshold in black-on-white mode can only grow the
        // foreground, so the traced square never disappears.
        let image = square_image(20, 10);
        let mut previous_had_path = false;
        for threshold in [10.0, 128.0, 250.0] {
            let mut tracer = Tracer::with_params(TraceParams {
                threshold: Threshold::Value(threshold),
                ..TraceParams::default()
            })
            .unwrap();
            tracer.load_image(&image);
            let has_path = tracer.get_svg().unwrap().contains("<path");
            assert!(has_path || !previous_had_path);
            previous_had_path = has_path;
        }
    }

    #[test]
    fn test_turd_size_culls_square() {
        let image = square_image(20, 10);

        let mut tracer = Tracer::with_params(TraceParams {
            threshold: Threshold::Value(128.0),
            ..TraceParams::default()
        })
        .unwrap();
        tracer.load_image(&image);
        assert!(tracer.get_svg().unwrap().contains("<path"));

        let mut tracer = Tracer::with_params(TraceParams {
            threshold: Threshold::Value(128.0),
            turd_size: 200,
            ..TraceParams::default()
        })
        .unwrap();
        tracer.load_image(&image);
        assert!(!tracer.get_svg().unwrap().contains("<path"));
    }

    #[test]
    fn test_opt_curve_output_is_no_longer() {
        let image = square_image(64, 40);
        let mut optimized = Tracer::new();
        optimized.load_image(&image);
        let optimized_svg = optimized.get_svg().unwrap();

        let mut plain = Tracer::with_params(TraceParams {
            opt_curve: false,
            ..TraceParams::default()
        })
        .unwrap();
        plain.load_image(&image);
        let plain_svg = plain.get_svg().unwrap();

        assert!(optimized_svg.len() <= plain_svg.len());
    }

    #[test]
    fn test_effective_threshold_fallback_on_flat_image() {
        let mut tracer = Tracer::new();
        tracer.load_image(&solid_image(4, 4, 77));
        // Single-color histogram yields no Otsu threshold.
        assert_eq!(tracer.effective_threshold().unwrap(), 128.0);
    }
}
