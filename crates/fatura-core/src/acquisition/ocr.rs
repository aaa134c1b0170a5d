//! OCR engine wrapper using `pure-onnx-ocr`.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::TextRecognizer;
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Rows closer than this many pixels are read as one line.
const ROW_HEIGHT: f64 = 20.0;

type Reply = mpsc::Sender<Result<Vec<Region>, OcrError>>;

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// The underlying engine is not `Send`, so it lives on its own worker thread
/// and pages are handed to it over a channel. The worker exits when the
/// engine is dropped.
pub struct PureOcrEngine {
    jobs: mpsc::Sender<(DynamicImage, Reply)>,
}

/// A recognized text region with its top-left corner.
struct Region {
    x: f64,
    y: f64,
    text: String,
}

impl PureOcrEngine {
    /// Create an engine from the model files named in `config` inside `model_dir`.
    pub fn from_dir(model_dir: &Path, config: OcrConfig) -> Result<Self, OcrError> {
        let det_path = model_dir.join(&config.detection_model);
        let rec_path = model_dir.join(&config.recognition_model);
        let dict_path = model_dir.join(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!("{} not found", path.display())));
            }
        }

        let (jobs, queue) = mpsc::channel::<(DynamicImage, Reply)>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let keep_unk = config.keep_unk;

        thread::Builder::new()
            .name("fatura-ocr".to_string())
            .spawn(move || {
                let built = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                    .det_model_path(&det_path)
                    .rec_model_path(&rec_path)
                    .dictionary_path(&dict_path)
                    .build()
                    .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)));

                let engine = match built {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for (image, reply) in queue {
                    let _ = reply.send(regions(&engine, &image, keep_unk));
                }
                debug!("OCR worker stopped");
            })
            .map_err(|e| OcrError::ModelLoad(format!("cannot start OCR worker: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| OcrError::ModelLoad("OCR worker exited during startup".to_string()))??;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
        Ok(Self { jobs })
    }

    fn regions(&self, image: &DynamicImage) -> Result<Vec<Region>, OcrError> {
        let (reply, answer) = mpsc::channel();
        self.jobs
            .send((image.clone(), reply))
            .map_err(|_| OcrError::Recognition("OCR worker is not running".to_string()))?;
        answer
            .recv()
            .map_err(|_| OcrError::Recognition("OCR worker stopped mid-page".to_string()))?
    }
}

fn regions(
    engine: &pure_onnx_ocr::engine::OcrEngine,
    image: &DynamicImage,
    keep_unk: bool,
) -> Result<Vec<Region>, OcrError> {
    let results = engine
        .run_from_image(image)
        .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

    debug!("pure-onnx-ocr returned {} text regions", results.len());

    Ok(results
        .iter()
        .map(|r| {
            let (x, y) = r
                .bounding_box
                .exterior()
                .coords()
                .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| (x.min(c.x), y.min(c.y)));
            let text = if keep_unk {
                r.text.clone()
            } else {
                r.text.replace("[UNK]", " ")
            };
            Region { x, y, text }
        })
        .collect())
}

impl TextRecognizer for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("{}x{}", width, height)));
        }

        let mut regions = self.regions(image)?;
        sort_reading_order(&mut regions);

        let text = regions
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "OCR complete: {} regions from {}x{} in {}ms",
            regions.len(),
            width,
            height,
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Top-to-bottom by row band, then left-to-right.
fn sort_reading_order(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        let row_a = (a.y / ROW_HEIGHT) as i64;
        let row_b = (b.y / ROW_HEIGHT) as i64;
        row_a
            .cmp(&row_b)
            .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
}
