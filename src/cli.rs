use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use std::{
    env, fs,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::analysis::{Session, Summary};
use crate::config::{Profile, ProfileStore};
use crate::input::PoseReader;
use crate::job::{self, AnalysisPayload, Exercise, VideoMeta};
use crate::trace::Retention;

pub fn run() -> Result<()> {
    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }
    run_args(Arguments::from_env())
}

fn run_args(mut pargs: Arguments) -> Result<()> {
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("analyze") => {
            let profile_arg: Option<String> = pargs.opt_value_from_str("--profile")?;
            let retention: Retention = pargs
                .opt_value_from_str("--trace")?
                .unwrap_or(Retention::Off);
            let payload = pargs.contains("--payload");
            let video_key: Option<String> = pargs.opt_value_from_str("--video-key")?;
            let existing_sets: usize = pargs.opt_value_from_str("--existing-sets")?.unwrap_or(0);
            let input: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: repctl analyze <poses.jsonl|-> [options]"))?;

            let profile = load_profile(profile_arg.as_deref())?;
            info!("using profile '{}'", profile.display_name());

            let summary = if input == "-" {
                summarize(io::stdin().lock(), &profile, retention)?
            } else {
                let f = fs::File::open(&input)
                    .map_err(|e| anyhow!("failed to open {input}: {e}"))?;
                summarize(BufReader::new(f), &profile, retention)?
            };

            if payload {
                let key = match video_key {
                    Some(k) => Some(analyzed_key_for(&k, &profile, existing_sets)?),
                    None => None,
                };
                print_json(&serde_json::to_value(AnalysisPayload::new(&summary, key))?);
            } else {
                print_json(&serde_json::to_value(&summary)?);
            }
            Ok(())
        }

        Some("profiles") | Some("list") => {
            let store = user_store()?;
            let active = store.active_name()?;
            for name in store.list_profiles() {
                let mark = if name == active { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: repctl use <profile_name>"))?;
            let store = user_store()?;
            store.set_active(&name)?;
            println!("ok: active profile is now {name}");
            Ok(())
        }

        Some("show") => {
            let name: Option<String> = pargs.opt_free_from_str()?;
            let profile = load_profile(name.as_deref())?;
            print!("{}", toml::to_string_pretty(&profile)?);
            Ok(())
        }

        Some("check") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: repctl check <profile.toml>"))?;
            let profile = Profile::from_file(&path)?;
            println!("ok: {} is a valid profile ({})", path.display(), profile.display_name());
            Ok(())
        }

        Some("job") => {
            let exercise_id: Option<u32> = pargs.opt_value_from_str("--exercise")?;
            let input: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: repctl job <message.json|->"))?;
            let body = if input == "-" {
                io::read_to_string(io::stdin())?
            } else {
                fs::read_to_string(&input).map_err(|e| anyhow!("failed to read {input}: {e}"))?
            };
            print_json(&describe_job(&body, exercise_id)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn user_store() -> Result<ProfileStore> {
    let store = ProfileStore::user()?;
    store.install_defaults()?;
    Ok(store)
}

/// `--profile` wins; otherwise the active profile, falling back to the
/// built-in default when the profile store is unusable.
fn load_profile(arg: Option<&str>) -> Result<Profile> {
    match (arg, ProfileStore::user()) {
        (Some(a), Ok(store)) => {
            let _ = store.install_defaults();
            store.resolve(a)
        }
        (Some(a), Err(_)) => Profile::from_file(Path::new(a)).or_else(|_| Profile::builtin(a)),
        (None, Ok(store)) => match store.install_defaults().and_then(|_| store.load_active()) {
            Ok(p) => Ok(p),
            Err(e) => {
                warn!("active profile unusable ({e:#}); using built-in default");
                Profile::builtin("default")
            }
        },
        (None, Err(_)) => Profile::builtin("default"),
    }
}

/// Feeds a pose stream through a fresh session. A read or parse error
/// aborts the run; the partial session is dropped.
pub fn summarize<R: BufRead>(reader: R, profile: &Profile, retention: Retention) -> Result<Summary> {
    let mut session = Session::new(profile, retention)?;
    for frame in PoseReader::new(reader) {
        let frame = frame.context("pose stream")?;
        if session.push(&frame).is_break() {
            break;
        }
    }
    Ok(session.finish())
}

fn analyzed_key_for(video_key: &str, profile: &Profile, existing_sets: usize) -> Result<String> {
    let meta = VideoMeta::from_key(video_key)?;
    let exercise = Exercise::from_name(&profile.meta.exercise)
        .ok_or_else(|| anyhow!("unknown exercise '{}' in profile", profile.meta.exercise))?;
    Ok(meta.analyzed_key(exercise, existing_sets))
}

fn describe_job(body: &str, exercise_id: Option<u32>) -> Result<serde_json::Value> {
    let key = job::object_key_from_message(body)?;
    if job::is_analyzed_output(&key) {
        return Ok(serde_json::json!({"object_key": key, "skip": true}));
    }
    let meta = VideoMeta::from_key(&key)?;
    let exercise = Exercise::from_id(exercise_id.unwrap_or(Exercise::Squat.id()))?;
    Ok(serde_json::json!({
        "object_key": key,
        "skip": false,
        "video": meta,
        "exercise_id": exercise.id(),
        "result_prefix": meta.day_prefix(exercise),
    }))
}

fn print_help() {
    println!(
        r#"repctl — squat rep counter and scorer for pose landmark streams

USAGE:
  repctl help [command]                   Show general or command-specific help
  repctl analyze <poses.jsonl|-> [opts]   Count and score reps, print JSON summary
  repctl profiles                         List calibration profiles
  repctl use <name>                       Switch active profile
  repctl show [name|path]                 Print a profile as TOML
  repctl check <profile.toml>             Validate a profile file
  repctl job <message.json|->             Decode a queued analysis job

TIPS:
  - Profiles: ~/.config/repctl/profiles
  - Active profile pointer: ~/.config/repctl/active
  - RUST_LOG=debug shows discarded reps
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "analyze" => println!(
            "usage: repctl analyze <poses.jsonl|-> [--profile <name|path>] [--trace off|all|<n>]\n\
             \x20                     [--payload [--video-key <key>] [--existing-sets <n>]]\n\
             Reads one JSON pose frame per line and prints the summary.\n\
             --trace keeps a per-frame audit trail (all frames, or only the last <n>).\n\
             --payload prints the backend analysis record instead of the summary."
        ),
        "profiles" | "list" => {
            println!("usage: repctl profiles\nLists available profiles; marks active with '*'.")
        }
        "use" => println!("usage: repctl use <name>\nSwitches the active profile to <name>."),
        "show" => println!(
            "usage: repctl show [name|path]\nPrints the active (or named) profile as TOML."
        ),
        "check" => println!(
            "usage: repctl check <profile.toml>\nParses and validates a profile without installing it."
        ),
        "job" => println!(
            "usage: repctl job <message.json|-> [--exercise <id>]\n\
             Decodes a queue message into the video key, uploader metadata and result folder."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_json(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
