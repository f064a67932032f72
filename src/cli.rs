use clap::Parser;
use std::path::PathBuf;
use vectrace::{
    Fill, FillStrategy, PosterizeParams, RangeDistribution, Steps, Threshold, TraceParams,
    TurnPolicy,
};

#[derive(Parser)]
#[command(name = "vectrace")]
#[command(about = "Trace bitmap images into SVG paths, or posterize them into tonal layers")]
#[command(version)]
pub struct Cli {
    /// Input image file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output SVG file (default: input with .svg extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Posterize into tonal layers instead of a single trace
    #[arg(short, long)]
    pub posterize: bool,

    /// Binarization threshold 0-255 (default: automatic)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Turn policy: black, white, left, right, minority, majority
    #[arg(long, default_value = "minority")]
    pub turn_policy: String,

    /// Drop contours enclosing up to this many pixels
    #[arg(long, default_value = "2")]
    pub turd_size: u32,

    /// Corner threshold (0 to 1.3334)
    #[arg(long, default_value = "1.0")]
    pub alpha_max: f64,

    /// Skip the Bézier curve optimization pass
    #[arg(long)]
    pub no_curve_optimization: bool,

    /// Allowed curve optimization error
    #[arg(long, default_value = "0.2")]
    pub opt_tolerance: f64,

    /// Trace light pixels on a dark background
    #[arg(long)]
    pub white_on_black: bool,

    /// Path fill color
    #[arg(long, default_value = "auto")]
    pub color: String,

    /// Background color
    #[arg(long, default_value = "transparent")]
    pub background: String,

    /// Output width (default: source width)
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height (default: source height)
    #[arg(long)]
    pub height: Option<u32>,

    /// Posterize steps: a count or a comma-separated threshold list
    #[arg(short, long)]
    pub steps: Option<String>,

    /// Posterize fill strategy: spread, dominant, mean, median
    #[arg(long, default_value = "dominant")]
    pub fill_strategy: String,

    /// Posterize range distribution: auto, equal
    #[arg(long, default_value = "auto")]
    pub range_distribution: String,

    /// Load a full parameter set from a JSON file (overrides other flags)
    #[arg(long)]
    pub params: Option<PathBuf>,
}

impl Cli {
    /// Assemble posterize parameters from the individual flags.
    pub fn to_params(&self) -> anyhow::Result<PosterizeParams> {
        let trace = TraceParams {
            turn_policy: parse_turn_policy(&self.turn_policy)?,
            turd_size: self.turd_size,
            alpha_max: self.alpha_max,
            opt_curve: !self.no_curve_optimization,
            opt_tolerance: self.opt_tolerance,
            threshold: match self.threshold {
                Some(value) => Threshold::Value(value),
                None => Threshold::Auto,
            },
            black_on_white: !self.white_on_black,
            color: Fill::from(self.color.as_str()),
            background: Fill::from(self.background.as_str()),
            width: self.width,
            height: self.height,
        };

        Ok(PosterizeParams {
            trace,
            steps: parse_steps(self.steps.as_deref())?,
            fill_strategy: parse_fill_strategy(&self.fill_strategy)?,
            range_distribution: parse_range_distribution(&self.range_distribution)?,
        })
    }
}

fn parse_turn_policy(value: &str) -> anyhow::Result<TurnPolicy> {
    Ok(match value {
        "black" => TurnPolicy::Black,
        "white" => TurnPolicy::White,
        "left" => TurnPolicy::Left,
        "right" => TurnPolicy::Right,
        "minority" => TurnPolicy::Minority,
        "majority" => TurnPolicy::Majority,
        other => anyhow::bail!("unknown turn policy: {other}"),
    })
}

fn parse_steps(value: Option<&str>) -> anyhow::Result<Steps> {
    let Some(value) = value else {
        return Ok(Steps::Auto);
    };
    if value.contains(',') {
        let thresholds = value
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Steps::Thresholds(thresholds))
    } else {
        Ok(Steps::Count(value.trim().parse()?))
    }
}

fn parse_fill_strategy(value: &str) -> anyhow::Result<FillStrategy> {
    Ok(match value {
        "spread" => FillStrategy::Spread,
        "dominant" => FillStrategy::Dominant,
        "mean" => FillStrategy::Mean,
        "median" => FillStrategy::Median,
        other => anyhow::bail!("unknown fill strategy: {other}"),
    })
}

fn parse_range_distribution(value: &str) -> anyhow::Result<RangeDistribution> {
    Ok(match value {
        "auto" => RangeDistribution::Auto,
        "equal" => RangeDistribution::Equal,
        other => anyhow::bail!("unknown range distribution: {other}"),
    })
}
