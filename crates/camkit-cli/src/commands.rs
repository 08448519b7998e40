// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns what it produced so `main` decides
// how to print it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use camkit_core::config::CaptureConfig;
use camkit_core::geometry::detector_to_overlay;
use camkit_core::types::{CaptureMode, DetectionOptions, NormalizedRect, OutputQuality};
use camkit_image::{ImageAsset, ImageFinisher, ImageProcessor, SoftwareRectangleDetector};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{DetectArgs, FinishArgs};

/// Best rectangle found by `camkit detect`, in overlay space.
#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub input: PathBuf,
    pub rect: Option<NormalizedRect>,
    pub confidence: Option<f32>,
}

/// Build the capture configuration from `--config` and the override flags.
pub fn load_config(args: &FinishArgs) -> Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            CaptureConfig::from_json(&json)
                .with_context(|| format!("Failed to parse config: {:?}", path))?
        }
        None => CaptureConfig::new(CaptureMode::Photo),
    };

    if let Some(enhancement) = args.enhancement {
        config = config.with_enhancement(enhancement.into());
    }

    let quality = OutputQuality {
        max_output_width: args.max_width.or(config.output_quality.max_output_width),
        target_resolution: args.target.or(config.output_quality.target_resolution),
        compression_quality: args
            .quality
            .unwrap_or(config.output_quality.compression_quality),
    };
    Ok(config.with_output_quality(quality))
}

/// Finish every input and write `<stem>.jpg` plus `<stem>_original.png` into
/// the output directory. Returns the written paths.
pub fn finish(args: &FinishArgs) -> Result<Vec<PathBuf>> {
    let config = load_config(args)?;
    let finisher = ImageFinisher::from_config(&config);

    let mut assets = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let asset = ImageAsset::open(input)
            .with_context(|| format!("Failed to load image: {:?}", input))?;
        let asset = match args.crop {
            Some(rect) => ImageFinisher::crop(&asset, rect)
                .with_context(|| format!("Crop {:?} leaves nothing of {:?}", rect, input))?,
            None => asset,
        };
        assets.push(asset);
    }

    let finished = finisher.process(assets).context("Failed to finish images")?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.out_dir))?;

    let jpeg_quality = config.output_quality.jpeg_quality();
    let mut written = Vec::with_capacity(finished.len() * 2);
    for ((input, processed), original) in args
        .inputs
        .iter()
        .zip(finished.processed)
        .zip(finished.originals)
    {
        let stem = file_stem(input);

        // The finisher already compressed at the requested quality.
        let kept = processed.compressed_jpeg().map(<[u8]>::to_vec);
        let jpeg = match kept {
            Some(bytes) => bytes,
            None => ImageProcessor::from_dynamic(processed.into_dynamic()?)
                .to_jpeg_bytes(jpeg_quality)?,
        };
        let jpeg_path = args.out_dir.join(format!("{stem}.jpg"));
        std::fs::write(&jpeg_path, jpeg)
            .with_context(|| format!("Failed to save output: {:?}", jpeg_path))?;

        let png = ImageProcessor::from_dynamic(original.into_dynamic()?).to_png_bytes()?;
        let png_path = args.out_dir.join(format!("{stem}_original.png"));
        std::fs::write(&png_path, png)
            .with_context(|| format!("Failed to save output: {:?}", png_path))?;

        info!(input = %input.display(), output = %jpeg_path.display(), "Image finished");
        written.push(jpeg_path);
        written.push(png_path);
    }

    Ok(written)
}

/// Detect the most confident rectangle in an upright copy of the input.
pub fn detect(args: &DetectArgs) -> Result<DetectionReport> {
    if args.max_dimension == 0 {
        bail!("--max-dimension must be positive");
    }

    let image = ImageAsset::open(&args.input)
        .and_then(ImageAsset::normalized_orientation)
        .and_then(ImageAsset::into_dynamic)
        .with_context(|| format!("Failed to load image: {:?}", args.input))?;

    let detector = SoftwareRectangleDetector::new().with_max_dimension(args.max_dimension);
    let best = detector
        .detect(&image, &DetectionOptions::default())
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    if best.is_none() {
        warn!(input = %args.input.display(), "No rectangle found");
    }
    Ok(DetectionReport {
        input: args.input.clone(),
        rect: best.map(|found| detector_to_overlay(found.bounding_box)),
        confidence: best.map(|found| found.confidence),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
