use anyhow::Context;
use log::info;
use nova_restore::assets::{AssetLoader, CatalogAssetLoader};
use nova_restore::composite_sprite::{CompositeSpriteController, TransformData};
use nova_restore::restoration::{JsonBundleStore, NodeRecord, RestoreCoordinator, VoiceEntry};
use nova_restore::video::VideoController;
use nova_restore::{GameState, RestorationConfig};
use std::collections::HashMap;
use std::rc::Rc;

/// One scripted dialogue line of the demo scene
struct ScriptLine {
    text: &'static str,
    pose: &'static str,
    video: Option<&'static str>,
    voice: Option<&'static str>,
}

const SCENE: &str = "ch1_rooftop";

const SCRIPT: [ScriptLine; 3] = [
    ScriptLine {
        text: "The rain had not stopped for three days.",
        pose: "",
        video: Some("rain"),
        voice: None,
    },
    ScriptLine {
        text: "\"You came after all.\"",
        pose: "body+smile",
        video: Some("rain"),
        voice: Some("alice_001"),
    },
    ScriptLine {
        text: "\"...but you're late.\"",
        pose: "body+frown",
        video: None,
        voice: Some("alice_002"),
    },
];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => RestorationConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => RestorationConfig::default(),
    };
    config.apply_env();

    let mut state = GameState::from_config(&config);

    let mut catalog = CatalogAssetLoader::new();
    catalog.insert(format!("{}/rain", config.video_folder));
    for layer in ["body", "smile", "frown"] {
        catalog.insert(format!("{}/alice/{}", config.image_folder, layer));
    }
    let loader: Rc<dyn AssetLoader> = Rc::new(catalog);

    let (video, _video_registration) =
        VideoController::spawn(&state, "bg_video", config.video_folder.clone(), loader.clone())?;
    let (alice, _alice_registration) = CompositeSpriteController::spawn(
        &state,
        "alice",
        format!("{}/alice", config.image_folder),
        loader,
    )?;
    alice.borrow_mut().set_fade_duration(config.fade_duration);

    let mut coordinator = RestoreCoordinator::new(
        JsonBundleStore::new(&config.save_directory).context("Failed to open save directory")?,
    );
    let record = NodeRecord::new(SCENE);

    // Play the scene forward, saving at every line
    for (index, line) in SCRIPT.iter().enumerate() {
        match line.video {
            Some(name) => video.borrow_mut().set_video(name)?,
            None => video.borrow_mut().clear_video(),
        }
        {
            let mut alice = alice.borrow_mut();
            alice.set_pose(line.pose, true)?;
            alice.set_transform(TransformData {
                position: [index as f32 * 0.5, 0.0, 0.0],
                ..TransformData::default()
            });
            alice.finish_fade();
        }

        let voices: HashMap<_, _> = line
            .voice
            .map(|audio| ("alice".to_string(), VoiceEntry::new("alice", audio, 0.0)))
            .into_iter()
            .collect();
        let reached = state
            .checkpoints_mut()
            .record_reached(SCENE, index, voices, index > 0);

        let offset = record.append(line.text.as_bytes());
        let position = state
            .checkpoints_mut()
            .record_position(&record, offset, index)?;
        let bundle = coordinator.save(&state, &position)?;

        info!(
            "[{}:{}] {} ({} voice(s), {} restorable(s) saved)",
            SCENE,
            index,
            line.text,
            reached.voices().len(),
            bundle.len()
        );
    }

    // Jump back to the second line
    let report = coordinator.load_reached(&state, SCENE, 1)?;
    info!(
        "Restored {:?} at {}; video = {:?}, pose = {:?}",
        report.restored,
        report.position,
        video.borrow().current_video_name(),
        alice.borrow().current_pose()
    );

    Ok(())
}
