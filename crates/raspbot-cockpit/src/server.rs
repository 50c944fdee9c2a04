//! [`CockpitServer`] – the HTTP command surface.
//!
//! Listens on `0.0.0.0:5000` (configurable via [`CockpitServer::with_host`]
//! and [`CockpitServer::with_port`]).
//!
//! * `POST /api/...` → parse the form or JSON body, run the matching
//!   [`commands`](crate::commands) function, redirect back to `/` (or answer
//!   JSON for the joystick, servo and polling endpoints).
//! * `GET /stream` → endless MJPEG multipart stream.
//! * `GET /gallery`, `GET /img/:name` → saved pictures.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Json;
use raspbot_runtime::{EffectRequest, RobotContext, SequenceStart};
use raspbot_types::input::{clamp_float, clamp_int, int_in_range_or, switch_state};
use raspbot_types::{
    BotError, DEFAULT_SPEED, Direction, LedPreset, LightEffect, NUM_LEDS, PAN_MAX, PAN_MIN,
    TILT_MAX, TILT_MIN,
};
use raspbot_vision::{GALLERY_LIMIT, gallery, stream};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::commands;
use crate::pages;
use crate::params::Params;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 5000;
/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves the control page, the command API, the camera stream and the
/// gallery for one [`RobotContext`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use raspbot_cockpit::CockpitServer;
/// use raspbot_hal::{CaptureSettings, SimCamera, SimGateway};
/// use raspbot_runtime::RobotContext;
/// use raspbot_vision::PipelineSettings;
///
/// #[tokio::main]
/// async fn main() {
///     let ctx = RobotContext::new(
///         Box::new(SimGateway::new()),
///         Arc::new(SimCamera::new(640, 480)),
///         CaptureSettings::default(),
///         PipelineSettings::default(),
///         "/tmp/pictures",
///     );
///     CockpitServer::new(ctx)
///         .with_port(8000)
///         .run(async { tokio::signal::ctrl_c().await.ok(); })
///         .await
///         .unwrap();
/// }
/// ```
pub struct CockpitServer {
    ctx: RobotContext,
    host: String,
    port: u16,
}

impl CockpitServer {
    /// Create a server for `ctx` on [`DEFAULT_HOST`]:[`DEFAULT_PORT`].
    pub fn new(ctx: RobotContext) -> Self {
        Self {
            ctx,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the bind address (builder-style).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bind and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Io`] if the listener cannot be bound or the
    /// accept loop fails.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), BotError> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "cockpit listening");
        axum::serve(listener, router(self.ctx))
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("cockpit stopped");
        Ok(())
    }
}

/// Every route, bound to `ctx`.
pub fn router(ctx: RobotContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/panic", post(emergency))
        .route("/api/status", get(status))
        .route("/api/motor/speed", post(motor_speed))
        .route("/api/motor/move", post(motor_move))
        .route("/api/motor/stop", post(motor_stop))
        .route("/api/motor/pulse", post(motor_pulse))
        .route("/api/motor/joystick", post(motor_joystick))
        .route("/api/servo/set_json", post(servo_set))
        .route("/api/servo/center", post(servo_center))
        .route("/api/servo/random", post(servo_random))
        .route("/api/led/preset", post(led_preset))
        .route("/api/led/off", post(led_off))
        .route("/api/led/rgb_all", post(led_rgb_all))
        .route("/api/led/rgb_one", post(led_rgb_one))
        .route("/api/buzzer", post(buzzer))
        .route("/api/buzzer/pulse", post(buzzer_pulse))
        .route("/api/ultra", post(ultra))
        .route("/api/ultra/read", post(ultra_read))
        .route("/api/ultra/status", get(ultra_status))
        .route("/api/ir", post(ir))
        .route("/api/ir/read", post(ir_read))
        .route("/api/light/effect", post(light_effect))
        .route("/api/light/stop", post(light_stop))
        .route("/api/camera/snap", post(camera_snap))
        .route("/api/sequence/run", post(sequence_run))
        .route("/gallery", get(gallery_page))
        .route("/img/:name", get(image))
        .route("/stream", get(video_stream))
        .with_state(ctx)
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

fn byte(params: &Params, key: &str, lo: u8, hi: u8, default: u8) -> u8 {
    let v = clamp_int(params.get(key), i64::from(lo), i64::from(hi), i64::from(default));
    u8::try_from(v).unwrap_or(default)
}

fn rgb(params: &Params) -> (u8, u8, u8) {
    (
        byte(params, "r", 0, 255, 0),
        byte(params, "g", 0, 255, 0),
        byte(params, "b", 0, 255, 0),
    )
}

fn home() -> Redirect {
    Redirect::to("/")
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(pages::COCKPIT_HTML)
}

async fn emergency(State(ctx): State<RobotContext>) -> Redirect {
    commands::emergency_stop(&ctx).await;
    home()
}

async fn status(State(ctx): State<RobotContext>) -> impl IntoResponse {
    Json(ctx.status_report().await)
}

async fn motor_speed(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    let raw = int_in_range_or(params.get("speed"), 0, 255, i64::from(DEFAULT_SPEED));
    commands::set_speed(&ctx, u8::try_from(raw).unwrap_or(DEFAULT_SPEED)).await;
    home()
}

async fn motor_move(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    commands::drive(&ctx, Direction::parse(params.get("dir"))).await;
    home()
}

async fn motor_stop(State(ctx): State<RobotContext>) -> Redirect {
    commands::stop(&ctx).await;
    home()
}

async fn motor_pulse(State(ctx): State<RobotContext>) -> Redirect {
    commands::pulse_forward(&ctx, commands::MOTOR_PULSE).await;
    home()
}

async fn motor_joystick(State(ctx): State<RobotContext>, params: Params) -> impl IntoResponse {
    let x = clamp_float(params.get("x"), -1.0, 1.0, 0.0);
    let y = clamp_float(params.get("y"), -1.0, 1.0, 0.0);
    let ok = commands::joystick(&ctx, x, y).await;
    Json(json!({ "ok": ok }))
}

async fn servo_set(State(ctx): State<RobotContext>, params: Params) -> impl IntoResponse {
    let current = ctx.hardware.snapshot().await;
    let pan = clamp_int(
        params.get("pan"),
        i64::from(PAN_MIN),
        i64::from(PAN_MAX),
        i64::from(current.pan()),
    );
    let tilt = clamp_int(
        params.get("tilt"),
        i64::from(TILT_MIN),
        i64::from(TILT_MAX),
        i64::from(current.tilt()),
    );
    let (ok, pan, tilt) = commands::point_camera(&ctx, pan, tilt).await;
    Json(json!({ "ok": ok, "pan": pan, "tilt": tilt }))
}

async fn servo_center(State(ctx): State<RobotContext>) -> Redirect {
    commands::center_camera(&ctx).await;
    home()
}

async fn servo_random(State(ctx): State<RobotContext>) -> Redirect {
    commands::random_camera_pose(&ctx).await;
    home()
}

async fn led_preset(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    let index = byte(&params, "color", 0, 6, 0);
    let preset = LedPreset::from_index(index).unwrap_or(LedPreset::Red);
    commands::led_preset(&ctx, preset).await;
    home()
}

async fn led_off(State(ctx): State<RobotContext>) -> Redirect {
    commands::led_off(&ctx).await;
    home()
}

async fn led_rgb_all(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    let (r, g, b) = rgb(&params);
    commands::led_rgb_all(&ctx, r, g, b).await;
    home()
}

async fn led_rgb_one(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    let n = byte(&params, "n", 0, NUM_LEDS, 1);
    let (r, g, b) = rgb(&params);
    commands::led_rgb_one(&ctx, n, r, g, b).await;
    home()
}

async fn buzzer(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    commands::buzzer(&ctx, switch_state(params.get("state"))).await;
    home()
}

async fn buzzer_pulse(State(ctx): State<RobotContext>) -> Redirect {
    commands::buzzer_pulse(&ctx, commands::BUZZER_PULSE).await;
    home()
}

async fn ultra(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    commands::ultrasonic_switch(&ctx, switch_state(params.get("state"))).await;
    home()
}

async fn ultra_read(State(ctx): State<RobotContext>) -> Redirect {
    commands::ultrasonic_read(&ctx).await;
    home()
}

async fn ultra_status(State(ctx): State<RobotContext>) -> impl IntoResponse {
    let (on, distance) = commands::ultrasonic_poll(&ctx).await;
    Json(json!({ "ultra_on": on, "distance": distance }))
}

async fn ir(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    commands::infrared_switch(&ctx, switch_state(params.get("state"))).await;
    home()
}

async fn ir_read(State(ctx): State<RobotContext>) -> Redirect {
    commands::infrared_read(&ctx).await;
    home()
}

async fn light_effect(State(ctx): State<RobotContext>, params: Params) -> Redirect {
    let effect = LightEffect::parse(params.get("name"));
    let seconds = clamp_float(params.get("duration"), 1.0, 300.0, 10.0);
    let speed = clamp_float(params.get("speed"), 0.01, 1.0, 0.05);
    let colour = LedPreset::from_index(byte(&params, "color", 0, 6, 0)).unwrap_or(LedPreset::Red);
    let request = EffectRequest {
        effect,
        duration: Duration::from_secs_f64(seconds),
        speed,
        colour,
    };
    commands::start_light_effect(&ctx, request).await;
    home()
}

async fn light_stop(State(ctx): State<RobotContext>) -> Redirect {
    commands::stop_light_effect(&ctx).await;
    home()
}

async fn camera_snap(State(ctx): State<RobotContext>) -> Redirect {
    match commands::snap(&ctx).await {
        Some(_) => Redirect::to("/gallery"),
        None => home(),
    }
}

async fn sequence_run(State(ctx): State<RobotContext>) -> Redirect {
    if commands::run_sequence(&ctx).await == SequenceStart::Busy {
        info!("sequence request ignored, one is already running");
    }
    home()
}

async fn gallery_page(State(ctx): State<RobotContext>) -> Response {
    match gallery::list_images(ctx.camera.save_dir(), GALLERY_LIMIT).await {
        Ok(entries) => Html(pages::gallery(&entries)).into_response(),
        Err(e) => {
            warn!(error = %e, "gallery listing failed");
            Html(pages::gallery(&[])).into_response()
        }
    }
}

async fn image(State(ctx): State<RobotContext>, Path(name): Path<String>) -> Response {
    let Some(path) = gallery::resolve_image(ctx.camera.save_dir(), &name).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(CONTENT_TYPE, gallery::content_type_for(&name))], bytes).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "image read failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn video_stream(State(ctx): State<RobotContext>) -> Response {
    let body = Body::from_stream(stream::mjpeg_stream(ctx.camera.clone()));
    (
        [
            (CONTENT_TYPE, stream::content_type()),
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_string()),
            (PRAGMA, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::{Request, header::LOCATION};
    use futures_util::StreamExt;
    use raspbot_hal::{BusCommand, CaptureSettings, SimCamera, SimGateway};
    use raspbot_vision::PipelineSettings;
    use tower::ServiceExt;

    struct Rig {
        gw: SimGateway,
        camera: SimCamera,
        ctx: RobotContext,
        dir: tempfile::TempDir,
    }

    fn rig() -> Rig {
        let gw = SimGateway::new();
        let camera = SimCamera::new(32, 24);
        let dir = tempfile::tempdir().unwrap();
        let ctx = RobotContext::new(
            Box::new(gw.clone()),
            Arc::new(camera.clone()),
            CaptureSettings {
                warmup_grabs: 1,
                flush_grabs: 1,
                grab_delay: Duration::ZERO,
                ..CaptureSettings::default()
            },
            PipelineSettings::default(),
            dir.path(),
        );
        Rig { gw, camera, ctx, dir }
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(ctx: &RobotContext, req: Request<Body>) -> Response {
        router(ctx.clone()).oneshot(req).await.unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(resp: &Response) -> &str {
        resp.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn index_serves_control_page() {
        let r = rig();
        let resp = send(&r.ctx, get_req("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("<title>Raspbot</title>"));
    }

    #[tokio::test]
    async fn move_forward_redirects_home() {
        let r = rig();
        let resp = send(&r.ctx, form("/api/motor/move", "dir=forward")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
        assert_eq!(r.gw.motor_speeds(), [120; 4]);
        assert_eq!(r.ctx.hardware.snapshot().await.status(), "forward, speed 120");
    }

    #[tokio::test]
    async fn move_without_dir_goes_forward_and_unknown_stops() {
        let r = rig();
        send(&r.ctx, form("/api/motor/move", "")).await;
        assert_eq!(r.gw.motor_speeds(), [120; 4]);
        send(&r.ctx, form("/api/motor/move", "dir=sideways")).await;
        assert_eq!(r.gw.motor_speeds(), [0; 4]);
    }

    #[tokio::test]
    async fn invalid_speed_falls_back_to_default() {
        let r = rig();
        send(&r.ctx, form("/api/motor/speed", "speed=60")).await;
        assert_eq!(r.ctx.hardware.snapshot().await.speed(), 60);
        send(&r.ctx, form("/api/motor/speed", "speed=999")).await;
        assert_eq!(r.ctx.hardware.snapshot().await.speed(), DEFAULT_SPEED);
        send(&r.ctx, form("/api/motor/speed", "speed=60")).await;
        send(&r.ctx, form("/api/motor/speed", "speed=fast")).await;
        assert_eq!(r.ctx.hardware.snapshot().await.speed(), DEFAULT_SPEED);
    }

    #[tokio::test]
    async fn joystick_deadzone_answers_json() {
        let r = rig();
        let resp = send(
            &r.ctx,
            json_post("/api/motor/joystick", json!({ "x": 0.05, "y": 0.05 })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "ok": true }));
        assert_eq!(r.gw.motor_speeds(), [0; 4]);
    }

    #[tokio::test]
    async fn servo_json_clamps_and_keeps_missing_axis() {
        let r = rig();
        let resp = send(&r.ctx, json_post("/api/servo/set_json", json!({ "pan": 5 }))).await;
        assert_eq!(
            body_json(resp).await,
            json!({ "ok": true, "pan": PAN_MIN, "tilt": 90 })
        );
        let resp = send(&r.ctx, json_post("/api/servo/set_json", json!({ "tilt": "abc" }))).await;
        assert_eq!(
            body_json(resp).await,
            json!({ "ok": true, "pan": PAN_MIN, "tilt": 90 })
        );
    }

    #[tokio::test]
    async fn preset_two_is_blue() {
        let r = rig();
        send(&r.ctx, form("/api/led/preset", "color=2")).await;
        assert!(r.gw.commands().contains(&BusCommand::AllPixelsRgb { r: 0, g: 0, b: 255 }));
        assert_eq!(
            r.ctx.hardware.snapshot().await.last_led_preset(),
            Some(LedPreset::Blue)
        );
    }

    #[tokio::test]
    async fn rgb_one_defaults_to_pixel_one() {
        let r = rig();
        send(&r.ctx, form("/api/led/rgb_one", "r=10&g=300")).await;
        assert!(r.gw.commands().contains(&BusCommand::PixelRgb { index: 1, r: 10, g: 255, b: 0 }));
    }

    #[tokio::test]
    async fn ultra_status_reports_switch_state() {
        let r = rig();
        let resp = send(&r.ctx, get_req("/api/ultra/status")).await;
        assert_eq!(body_json(resp).await, json!({ "ultra_on": false, "distance": null }));
        send(&r.ctx, form("/api/ultra", "state=1")).await;
        let resp = send(&r.ctx, get_req("/api/ultra/status")).await;
        assert_eq!(body_json(resp).await, json!({ "ultra_on": true, "distance": 0 }));
    }

    #[tokio::test]
    async fn light_effect_invalid_name_is_breathing() {
        let r = rig();
        send(&r.ctx, form("/api/light/effect", "name=disco&duration=5")).await;
        let active = r.ctx.supervisor.active_light_effect().unwrap();
        assert_eq!(active.effect, LightEffect::Breathing);
        assert_eq!(active.duration, Duration::from_secs(5));
        send(&r.ctx, form("/api/light/stop", "")).await;
        assert_eq!(r.ctx.supervisor.active_light_effect(), None);
        assert!(r.gw.commands().contains(&BusCommand::AllPixels { effect_code: 0, param: 0 }));
    }

    #[tokio::test]
    async fn light_effect_duration_keeps_fractions_and_clamps() {
        let r = rig();
        for (body, expected) in [
            ("name=river&duration=2.5", Duration::from_millis(2500)),
            ("name=river&duration=0.2", Duration::from_secs(1)),
            ("name=river&duration=900", Duration::from_secs(300)),
            ("name=river&duration=soon", Duration::from_secs(10)),
        ] {
            send(&r.ctx, form("/api/light/effect", body)).await;
            let active = r.ctx.supervisor.active_light_effect().unwrap();
            assert_eq!(active.duration, expected, "{body}");
        }
        send(&r.ctx, form("/api/light/stop", "")).await;
    }

    #[tokio::test]
    async fn snap_redirects_to_gallery_and_image_is_served() {
        let r = rig();
        let resp = send(&r.ctx, form("/api/camera/snap", "")).await;
        assert_eq!(location(&resp), "/gallery");

        let resp = send(&r.ctx, get_req("/gallery")).await;
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Gallery (1)"));

        let name = std::fs::read_dir(r.dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name()
            .into_string()
            .unwrap();
        let resp = send(&r.ctx, get_req(&format!("/img/{name}"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn snap_without_camera_goes_home() {
        let r = rig();
        r.camera.set_available(false);
        let resp = send(&r.ctx, form("/api/camera/snap", "")).await;
        assert_eq!(location(&resp), "/");
        assert_eq!(r.ctx.hardware.snapshot().await.status(), "no picture");
    }

    #[tokio::test]
    async fn missing_or_hidden_images_are_404() {
        let r = rig();
        std::fs::write(r.dir.path().join(".secret.jpg"), b"x").unwrap();
        let resp = send(&r.ctx, get_req("/img/nope.jpg")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = send(&r.ctx, get_req("/img/.secret.jpg")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_is_json_snapshot() {
        let r = rig();
        let resp = send(&r.ctx, get_req("/api/status")).await;
        let json = body_json(resp).await;
        assert_eq!(json["pan"], 90);
        assert_eq!(json["tilt"], 90);
        assert_eq!(json["tasks"]["sequence_running"], false);
    }

    #[tokio::test]
    async fn panic_turns_sensors_off() {
        let r = rig();
        send(&r.ctx, form("/api/ultra", "state=1")).await;
        let resp = send(&r.ctx, form("/api/panic", "")).await;
        assert_eq!(location(&resp), "/");
        assert!(!r.ctx.hardware.snapshot().await.ultrasonic_enabled());
        assert!(r.gw.commands().contains(&BusCommand::Ultrasonic(false)));
    }

    #[tokio::test]
    async fn stream_starts_with_a_jpeg_part() {
        let r = rig();
        let resp = send(&r.ctx, get_req("/stream")).await;
        assert_eq!(
            resp.headers()[CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        let mut body = resp.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
    }
}
