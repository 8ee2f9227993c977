use crate::embedding::{Embedding, EmbeddingSource};
use crate::gallery::TimeSpan;
use crate::utils::bbox::BoundingBox;
use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::Rng;

pub const RED: [u8; 3] = [200, 20, 20];
pub const BLUE: [u8; 3] = [20, 20, 200];
pub const GREEN: [u8; 3] = [20, 200, 20];
const BACKGROUND: [u8; 3] = [128, 128, 128];

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;

/// Deterministic embedding source: the mean colour of a crop
///
#[derive(Default, Debug)]
pub struct MeanColor {
    /// sizes of the batches passed to `extract`
    pub batches: Vec<usize>,
}

impl EmbeddingSource for MeanColor {
    fn extract(&mut self, images: &[RgbImage]) -> Result<Vec<Embedding>> {
        self.batches.push(images.len());
        Ok(images.iter().map(mean_color).collect())
    }
}

fn mean_color(img: &RgbImage) -> Embedding {
    let n = (img.width() * img.height()).max(1) as f32;
    let mut acc = [0.0f32; 3];
    for p in img.pixels() {
        for (a, c) in acc.iter_mut().zip(p.0.iter()) {
            *a += *c as f32;
        }
    }
    acc.iter().map(|a| a / n / 255.0).collect()
}

/// Embedding source whose backend is down
///
#[derive(Default, Debug)]
pub struct Broken;

impl EmbeddingSource for Broken {
    fn extract(&mut self, _images: &[RgbImage]) -> Result<Vec<Embedding>> {
        bail!("Inference backend is not available")
    }
}

/// Person-sized box with the left edge at `x`
///
pub fn person(x: f32) -> BoundingBox {
    BoundingBox::new(x, 40.0, 40.0, 100.0)
}

/// Grey frame with every box filled with its colour
///
pub fn frame_with(people: &[(BoundingBox, [u8; 3])]) -> RgbImage {
    let mut frame = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb(BACKGROUND));
    for (bbox, color) in people {
        let x1 = bbox.left().max(0.0) as u32;
        let y1 = bbox.top().max(0.0) as u32;
        let x2 = (bbox.right().max(0.0) as u32).min(FRAME_WIDTH);
        let y2 = (bbox.bottom().max(0.0) as u32).min(FRAME_HEIGHT);
        for y in y1..y2 {
            for x in x1..x2 {
                frame.put_pixel(x, y, Rgb(*color));
            }
        }
    }
    frame
}

pub fn random_span(rng: &mut StdRng) -> TimeSpan {
    let start = rng.gen_range(0..1000u64);
    let len = rng.gen_range(0..200u64);
    TimeSpan::new(start, start + len)
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}
