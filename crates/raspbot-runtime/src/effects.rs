//! LED strip light shows.
//!
//! [`EffectRenderer`] is the seam the task supervisor drives; [`PixelShow`]
//! is the built-in implementation that paints the strip through the
//! hardware mutex domain, one short lock per frame.

use std::f64::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raspbot_kernel::HardwareDomain;
use raspbot_types::{BotError, LedPreset, LightEffect, NUM_LEDS};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Parameters of one light-show run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectRequest {
    pub effect: LightEffect,
    pub duration: Duration,
    /// Seconds per animation frame.
    pub speed: f64,
    pub colour: LedPreset,
}

/// Renders light effects on the LED strip.
#[async_trait]
pub trait EffectRenderer: Send + Sync {
    /// Animate until `request.duration` elapses or `stop` is cancelled.
    ///
    /// Must check `stop` at least once per frame. Bus faults on a frame are
    /// logged and the show carries on.
    async fn run(&self, request: EffectRequest, stop: CancellationToken) -> Result<(), BotError>;

    /// Switch every indicator off.
    async fn turn_off_all(&self) -> Result<(), BotError>;
}

type Rgb = (u8, u8, u8);

/// Built-in renderer for the five named effects.
pub struct PixelShow {
    hw: HardwareDomain,
    pixels: u8,
}

impl PixelShow {
    pub fn new(hw: HardwareDomain) -> Self {
        Self {
            hw,
            pixels: NUM_LEDS,
        }
    }

    async fn paint(&self, frame: &[Rgb]) -> Result<(), BotError> {
        let mut hw = self.hw.lock().await;
        let gw = hw.gateway();
        match frame.first() {
            Some(&first) if frame.iter().all(|&p| p == first) => {
                gw.set_all_pixels_rgb(first.0, first.1, first.2)
            }
            _ => {
                let mut first_err = None;
                for (i, &(r, g, b)) in frame.iter().enumerate() {
                    if let Err(e) = gw.set_pixel_rgb(i as u8, r, g, b) {
                        first_err.get_or_insert(e);
                    }
                }
                first_err.map_or(Ok(()), Err)
            }
        }
    }
}

#[async_trait]
impl EffectRenderer for PixelShow {
    async fn run(&self, request: EffectRequest, stop: CancellationToken) -> Result<(), BotError> {
        let frame_time = Duration::from_secs_f64(request.speed.clamp(0.01, 1.0));
        let deadline = Instant::now() + request.duration;
        let mut rng = StdRng::from_entropy();
        let mut tick: u64 = 0;

        debug!(effect = %request.effect, ?frame_time, "light show started");
        while !stop.is_cancelled() && Instant::now() < deadline {
            let frame = render_frame(request.effect, request.colour, self.pixels, tick, &mut rng);
            if let Err(e) = self.paint(&frame).await {
                warn!(effect = %request.effect, tick, error = %e, "light show frame incomplete");
            }
            tick += 1;

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(frame_time) => {}
            }
        }
        Ok(())
    }

    async fn turn_off_all(&self) -> Result<(), BotError> {
        self.hw.lock().await.leds_off()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frame generators
// ────────────────────────────────────────────────────────────────────────────

fn scale(rgb: Rgb, level: f64) -> Rgb {
    let f = |c: u8| (f64::from(c) * level.clamp(0.0, 1.0)).round() as u8;
    (f(rgb.0), f(rgb.1), f(rgb.2))
}

/// Hue in [0, 360) at full saturation and value.
fn hue(h: f64) -> Rgb {
    let h = h.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let c = |v: f64| (v * 255.0).round() as u8;
    (c(r), c(g), c(b))
}

/// Pixel colours for frame number `tick`.
pub(crate) fn render_frame(
    effect: LightEffect,
    colour: LedPreset,
    pixels: u8,
    tick: u64,
    rng: &mut impl Rng,
) -> Vec<Rgb> {
    let n = usize::from(pixels);
    let base = colour.rgb();
    let off = (0, 0, 0);
    match effect {
        // A three-pixel comet running along the strip with a fading tail.
        LightEffect::River => {
            let head = (tick % n.max(1) as u64) as usize;
            (0..n)
                .map(|i| match (head + n - i) % n.max(1) {
                    0 => base,
                    1 => scale(base, 0.4),
                    2 => scale(base, 0.1),
                    _ => off,
                })
                .collect()
        }
        LightEffect::Breathing => {
            let phase = (tick % 40) as f64 / 40.0;
            let level = 0.5 - 0.5 * (2.0 * PI * phase).cos();
            vec![scale(base, level); n]
        }
        LightEffect::Gradient => (0..n)
            .map(|i| hue(tick as f64 * 12.0 + i as f64 * 360.0 / n.max(1) as f64))
            .collect(),
        LightEffect::RandomRunning => {
            let lit = rng.gen_range(0..n.max(1));
            let colour = hue(rng.gen_range(0.0..360.0));
            (0..n).map(|i| if i == lit { colour } else { off }).collect()
        }
        LightEffect::Starlight => (0..n)
            .map(|_| {
                if rng.gen_bool(0.2) {
                    scale(base, rng.gen_range(0.3..1.0))
                } else {
                    off
                }
            })
            .collect(),
    }
}
