// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::PathBuf;

use camkit_core::types::{EnhancementMode, NormalizedRect, Resolution};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "camkit")]
#[command(version, about = "Finish captured images and find document rectangles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the finishing pipeline (optional crop, enhancement, resize,
    /// recompression) over image files
    Finish(FinishArgs),
    /// Run the software rectangle detector on an image and print the
    /// overlay-space rectangle
    Detect(DetectArgs),
}

#[derive(Args, Debug)]
pub struct FinishArgs {
    /// Input image paths
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Capture configuration (JSON); flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enhancement preset
    #[arg(short, long, value_enum)]
    pub enhancement: Option<EnhancementArg>,

    /// Maximum output width in points
    #[arg(long)]
    pub max_width: Option<f64>,

    /// Fit the output inside this resolution (e.g. "1600x1200")
    #[arg(long, value_parser = parse_resolution)]
    pub target: Option<Resolution>,

    /// JPEG compression quality in (0, 1]
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Crop rect as normalized "x,y,w,h" (top-left origin), applied before
    /// finishing
    #[arg(long, value_parser = parse_rect)]
    pub crop: Option<NormalizedRect>,

    /// Directory that receives `<stem>.jpg` and `<stem>_original.png`
    #[arg(short, long)]
    pub out_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Longest side the detector works at, in pixels
    #[arg(long, default_value = "320")]
    pub max_dimension: u32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementArg {
    None,
    Auto,
    Grayscale,
}

impl From<EnhancementArg> for EnhancementMode {
    fn from(arg: EnhancementArg) -> Self {
        match arg {
            EnhancementArg::None => Self::None,
            EnhancementArg::Auto => Self::Auto,
            EnhancementArg::Grayscale => Self::Grayscale,
        }
    }
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid resolution '{s}', expected WxH"))?;

    let width: f64 = width
        .trim()
        .parse()
        .map_err(|_| format!("Invalid width: {width}"))?;
    let height: f64 = height
        .trim()
        .parse()
        .map_err(|_| format!("Invalid height: {height}"))?;

    if width <= 0.0 || height <= 0.0 {
        return Err("Resolution values must be positive".to_string());
    }
    Ok(Resolution::new(width, height))
}

fn parse_rect(s: &str) -> Result<NormalizedRect, String> {
    let parts = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid rect component: {part}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [x, y, width, height] = parts[..] else {
        return Err(format!("Invalid rect '{s}', expected x,y,w,h"));
    };
    if width <= 0.0 || height <= 0.0 {
        return Err("Rect width and height must be positive".to_string());
    }
    Ok(NormalizedRect::new(x, y, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_either_separator() {
        assert_eq!(
            parse_resolution("1600x1200").unwrap(),
            Resolution::new(1600.0, 1200.0)
        );
        assert_eq!(
            parse_resolution("640X480").unwrap(),
            Resolution::new(640.0, 480.0)
        );
        assert!(parse_resolution("1600").is_err());
        assert!(parse_resolution("0x10").is_err());
    }

    #[test]
    fn rect_needs_four_positive_sized_components() {
        assert_eq!(
            parse_rect("0.1, 0.2, 0.5, 0.5").unwrap(),
            NormalizedRect::new(0.1, 0.2, 0.5, 0.5)
        );
        assert!(parse_rect("0.1,0.2,0.5").is_err());
        assert!(parse_rect("0,0,-1,1").is_err());
        assert!(parse_rect("a,b,c,d").is_err());
    }

    #[test]
    fn finish_command_parses() {
        let cli = Cli::try_parse_from([
            "camkit",
            "finish",
            "a.jpg",
            "b.png",
            "--enhancement",
            "grayscale",
            "--max-width",
            "1000",
            "--out-dir",
            "out",
        ])
        .unwrap();

        let Command::Finish(args) = cli.command else {
            panic!("expected finish");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.enhancement, Some(EnhancementArg::Grayscale));
        assert_eq!(args.max_width, Some(1000.0));
        assert_eq!(args.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn finish_requires_out_dir() {
        assert!(Cli::try_parse_from(["camkit", "finish", "a.jpg"]).is_err());
    }
}
