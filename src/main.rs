//! Headless demo: drive a `TGFXThreadsView` through the bindings and save the last
//! presented frame as PNG.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use displaylist::platform::{CanvasRegistry, FsAssetLoader, ViewEvent};
use displaylist::view::scene::{BRIDGE_IMAGE, LOGO_IMAGE, scene_name};
use displaylist::{
    Bindings, ConfigManager, RenderMode, ScriptValue, THREADS_VIEW_CLASS, ViewEnvironment,
};

const CANVAS_ID: &str = "#displaylist";
const IDLE_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "displaylist-demo", version, about = "Render a display-list demo scene to PNG")]
struct Args {
    /// Canvas width in device pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Canvas height in device pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    density: f64,

    /// Scene index (0 = gallery, 1 = motion)
    #[arg(long, default_value_t = 0)]
    scene: u32,

    #[arg(long, default_value_t = 1.0)]
    zoom: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_x: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_y: f64,

    /// Render mode: direct, partial or tile
    #[arg(long, value_parser = parse_mode)]
    mode: Option<RenderMode>,

    /// Background image
    #[arg(long)]
    image: Option<PathBuf>,

    /// Logo image shown on the gallery card
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Font files to register, in order
    #[arg(long = "font")]
    fonts: Vec<PathBuf>,

    #[arg(long)]
    no_blur: bool,

    #[arg(long)]
    show_dirty_rect: bool,

    /// Number of draw calls; later frames step the zoom slightly
    #[arg(long, default_value_t = 1)]
    frames: u32,

    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,

    /// Settings file (JSON) to use instead of the user config
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn parse_mode(value: &str) -> Result<RenderMode, String> {
    RenderMode::parse(value).ok_or_else(|| format!("unknown render mode `{value}`"))
}

fn path_arg(path: &PathBuf) -> ScriptValue {
    ScriptValue::String(path.to_string_lossy().into_owned())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.settings {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::new(),
    };
    if let Some(mode) = args.mode {
        let mut settings = config.get();
        settings.render_mode = mode;
        config.update(settings);
    }

    let canvases = Arc::new(CanvasRegistry::new());
    let probe = canvases.add_canvas(CANVAS_ID, args.width, args.height);
    let env = ViewEnvironment::new(canvases, Arc::new(FsAssetLoader::new())).with_config(config);

    let failures = Arc::new(AtomicUsize::new(0));
    {
        let failures = Arc::clone(&failures);
        env.events.subscribe(move |event| match event {
            ViewEvent::RenderFailed { frame, message } => {
                log::error!("frame {frame} failed: {message}");
                failures.fetch_add(1, Ordering::SeqCst);
            }
            ViewEvent::ResourceLoadFailed { id, reason } => {
                log::warn!("could not load {id}: {reason}");
            }
            ViewEvent::FramePresented {
                frame,
                damage,
                complete,
            } => {
                log::debug!("frame {frame}: {} damage rects, complete={complete}", damage.len());
            }
        });
    }

    let mut bindings = Bindings::new(env);
    let handle = match bindings.call_static(
        THREADS_VIEW_CLASS,
        "MakeFrom",
        &[ScriptValue::String(CANVAS_ID.to_string())],
    )? {
        ScriptValue::Handle(handle) => handle,
        other => bail!("MakeFrom({CANVAS_ID}) returned {other:?}"),
    };

    if !args.fonts.is_empty() {
        let fonts = args.fonts.iter().map(path_arg).collect();
        let ok = bindings.call(handle, "registerFonts", &[ScriptValue::Array(fonts)])?;
        if ok != ScriptValue::Bool(true) {
            log::warn!("some fonts failed to register");
        }
    }
    for (name, path) in [(BRIDGE_IMAGE, &args.image), (LOGO_IMAGE, &args.logo)] {
        if let Some(path) = path {
            let ok = bindings.call(
                handle,
                "setImagePath",
                &[ScriptValue::String(name.to_string()), path_arg(path)],
            )?;
            if ok != ScriptValue::Bool(true) {
                bail!("failed to load image {}", path.display());
            }
        }
    }

    let resized = bindings.call(
        handle,
        "updateSize",
        &[
            ScriptValue::Number(args.width as f64),
            ScriptValue::Number(args.height as f64),
            ScriptValue::Number(args.density),
        ],
    )?;
    if resized != ScriptValue::Bool(true) {
        bail!("invalid canvas size {}x{}", args.width, args.height);
    }
    bindings.call(handle, "setAllowBlur", &[ScriptValue::Bool(!args.no_blur)])?;
    bindings.call(handle, "setShowDirtyRect", &[ScriptValue::Bool(args.show_dirty_rect)])?;

    log::info!(
        "rendering scene {} ({}) for {} frame(s)",
        args.scene,
        scene_name(args.scene),
        args.frames
    );
    for step in 0..args.frames.max(1) {
        let zoom = args.zoom * (1.0 + step as f64 * 0.01);
        let accepted = bindings.call(
            handle,
            "draw",
            &[
                ScriptValue::Number(args.scene as f64),
                ScriptValue::Number(zoom),
                ScriptValue::Number(args.offset_x),
                ScriptValue::Number(args.offset_y),
            ],
        )?;
        if accepted == ScriptValue::Bool(false) {
            bail!("render thread is gone");
        }
    }

    if !bindings.wait_idle(handle, IDLE_WAIT)? {
        bail!("render thread did not go idle within {IDLE_WAIT:?}");
    }
    bindings.release(handle);

    if failures.load(Ordering::SeqCst) > 0 {
        bail!("rendering failed, see log");
    }
    let frame = probe.last_frame().context("no frame was presented")?;
    frame
        .save_png(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "wrote {} ({}x{}, {} frame(s) presented)",
        args.output.display(),
        frame.width(),
        frame.height(),
        probe.presented_count()
    );
    Ok(())
}
