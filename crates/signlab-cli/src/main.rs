use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use signlab_hw::{Camera, CameraConfig};
use std::path::PathBuf;
use std::time::Instant;

mod client;

use client::ApiClient;

#[derive(Parser)]
#[command(name = "signlab", about = "SignLab sign language learning CLI")]
struct Cli {
    /// signlabd base URL
    #[arg(long, env = "SIGNLAB_URL", default_value = "http://127.0.0.1:8000", global = true)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// List supported sign languages
    Languages,
    /// List course modules of a language
    Modules {
        /// Language code (e.g., "ASL")
        lang: String,
    },
    /// Search signs of a language
    Search { lang: String, term: String },
    /// Create an account
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: String,
    },
    /// Show learning statistics for a user
    Stats { user: String },
    /// Show the weekly progress report for a user
    Report { user: String },
    /// Show today's challenge
    Challenge,
    /// Show the leaderboard
    Leaderboard {
        /// signs_learned, accuracy or practice_time
        #[arg(short, long, default_value = "signs_learned")]
        metric: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List V4L2 capture devices
    Devices,
    /// Run camera diagnostics (bypasses the daemon)
    Test {
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Frames to capture
        #[arg(short, long, default_value_t = 30)]
        frames: usize,
        /// Write the last frame as JPEG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(&cli.url);

    match cli.command {
        Commands::Status => {
            let data = api.get("/status").await?;
            let engine = &data["engine"];
            println!("signlabd {} (up {}s)", text(&data["version"]), data["uptime_seconds"]);
            println!(
                "  camera:     {}",
                if engine["camera_available"].as_bool() == Some(true) {
                    text(&engine["camera_device"])
                } else {
                    "unavailable".to_string()
                }
            );
            println!("  landmarks:  {}", yes_no(&engine["landmark_model_loaded"]));
            println!("  classifier: {} ({} classes)", text(&engine["classifier"]), engine["classes"]);
            println!("  fallback:   {}", yes_no(&engine["fallback_mode"]));
            println!(
                "  active:     {} quizzes, {} practice, {} challenges",
                data["active_quizzes"], data["active_practice_sessions"], data["active_challenges"]
            );
        }
        Commands::Languages => {
            let data = api.get("/languages").await?;
            for lang in data.as_array().into_iter().flatten() {
                println!(
                    "{:<5} {:<32} {:<8} {}",
                    text(&lang["code"]),
                    text(&lang["name"]),
                    text(&lang["difficulty"]),
                    text(&lang["region"])
                );
            }
        }
        Commands::Modules { lang } => {
            let data = api.get(&format!("/languages/{lang}/modules")).await?;
            for module in data.as_array().into_iter().flatten() {
                let count = module["questions"].as_array().map_or(0, Vec::len);
                println!("{:<10} {} ({count} signs)", text(&module["id"]), text(&module["title"]));
            }
        }
        Commands::Search { lang, term } => {
            let data = api.get(&format!("/languages/{lang}/search?q={}", encode(&term))).await?;
            let hits = data.as_array().map(Vec::as_slice).unwrap_or_default();
            if hits.is_empty() {
                println!("No signs match '{term}'");
            }
            for q in hits {
                println!("{:<16} {}", text(&q["sign"]), text(&q["description"]));
            }
        }
        Commands::Register { email, password, name } => {
            let data = api
                .post(
                    "/users/register",
                    &json!({"email": email, "password": password, "name": name}),
                )
                .await?;
            println!("Registered {email} as {}", text(&data["user_id"]));
        }
        Commands::Stats { user } => {
            let data = api.get(&format!("/users/{user}/stats")).await?;
            let s = &data["stats"];
            println!("Signs learned:   {}", s["total_signs_learned"]);
            println!("Accuracy:        {}%", s["average_accuracy"]);
            println!("Practice time:   {} min", s["total_practice_time"]);
            println!("Quizzes:         {} (avg {}%)", s["quizzes_completed"], s["average_quiz_score"]);
            println!("Streak:          {} days (best {})", s["current_streak"], s["best_streak"]);
            let goal = &data["daily_goal"];
            println!(
                "Daily goal:      {}/{} min{}",
                goal["today_minutes"],
                goal["goal_minutes"],
                if goal["met_goal"].as_bool() == Some(true) { " ✓" } else { "" }
            );
        }
        Commands::Report { user } => {
            let data = api.get(&format!("/users/{user}/weekly-report")).await?;
            println!("Sessions:        {}", data["total_sessions"]);
            println!("Practice:        {} min", data["total_practice_minutes"]);
            println!("Accuracy:        {}% ({})", data["average_accuracy"], text(&data["accuracy_trend"]));
            println!("Signs learned:   {}", data["unique_signs_learned"]);
            for a in data["achievements_this_week"].as_array().into_iter().flatten() {
                println!("  * {}: {}", text(&a["name"]), text(&a["description"]));
            }
            for area in data["improvement_areas"].as_array().into_iter().flatten() {
                println!("  - {}", text(&area["suggestion"]));
            }
        }
        Commands::Challenge => {
            let data = api.get("/challenges/today").await?;
            let c = &data["challenge"];
            println!("{} ({}, difficulty {})", text(&c["name"]), text(&c["language"]), c["difficulty"]);
            println!("  {}", text(&data["info"]["description"]));
            println!("  time limit: {}s", c["time_limit_secs"]);
            let signs: Vec<String> = c["signs"].as_array().into_iter().flatten().map(text).collect();
            println!("  signs: {}", signs.join(", "));
        }
        Commands::Leaderboard { metric, limit } => {
            let data = api.get(&format!("/leaderboard?metric={metric}&limit={limit}")).await?;
            for e in data.as_array().into_iter().flatten() {
                println!("{:>3}. {:<24} {:>8} {}", e["rank"], text(&e["name"]), e["value"], text(&e["level"]));
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{:<12} {} [{}] {}", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Test { device, frames, output } => {
            run_camera_test(&device, frames, output)?;
        }
    }

    Ok(())
}

/// Capture frames directly from a device and report what the engine would see.
fn run_camera_test(device: &str, frames: usize, output: Option<PathBuf>) -> Result<()> {
    println!("Running camera diagnostics on {device}...");
    let config = CameraConfig {
        device: device.to_string(),
        ..CameraConfig::default()
    };
    let camera = Camera::open_device(device, &config).with_context(|| format!("cannot open {device}"))?;
    println!(
        "  format:     {}x{} {:?}",
        camera.width,
        camera.height,
        camera.pixel_format()
    );

    let wanted = frames.max(1);
    let mut seen = 0usize;
    let mut dark = 0usize;
    let mut brightness = 0.0f64;
    let mut last = None;
    let start = Instant::now();
    let captured = camera.capture_while(|frame| {
        seen += 1;
        if frame.is_dark {
            dark += 1;
        }
        brightness += f64::from(frame.avg_brightness());
        last = Some(frame);
        seen < wanted
    })?;
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);

    println!(
        "  captured:   {captured} frames in {elapsed:.2}s ({:.1} fps)",
        captured as f64 / elapsed
    );
    println!("  brightness: {:.1} avg", brightness / captured.max(1) as f64);
    println!("  dark:       {dark}/{captured}");

    if let (Some(frame), Some(path)) = (last, output) {
        std::fs::write(&path, frame.to_jpeg(90)?).with_context(|| format!("cannot write {}", path.display()))?;
        println!("  snapshot:   {}", path.display());
    }
    Ok(())
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn yes_no(v: &Value) -> &'static str {
    if v.as_bool() == Some(true) {
        "yes"
    } else {
        "no"
    }
}

/// Percent-encode a query value.
fn encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
