//! Video player component
//!
//! Plays at most one clip at a time. The only state that matters for
//! restoration is which clip is active, where "no clip" is a real state of
//! its own.

use crate::assets::{AssetHandle, AssetLoader, asset_path};
use crate::game_state::GameState;
use crate::restoration::{
    AssetError, Registration, RegistryError, Restorable, RestorableError, RestorablePriority,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

pub struct VideoController {
    lua_name: String,
    video_folder: String,
    current_video_name: Option<String>,
    clip: Option<AssetHandle>,
    prepared: bool,
    loader: Rc<dyn AssetLoader>,
}

impl VideoController {
    pub fn new(
        lua_name: impl Into<String>,
        video_folder: impl Into<String>,
        loader: Rc<dyn AssetLoader>,
    ) -> Self {
        VideoController {
            lua_name: lua_name.into(),
            video_folder: video_folder.into(),
            current_video_name: None,
            clip: None,
            prepared: false,
            loader,
        }
    }

    /// Creates a shared controller, registering it if it has a script name
    pub fn spawn(
        state: &GameState,
        lua_name: impl Into<String>,
        video_folder: impl Into<String>,
        loader: Rc<dyn AssetLoader>,
    ) -> Result<(Rc<RefCell<Self>>, Option<Registration>), RegistryError> {
        let controller = Rc::new(RefCell::new(Self::new(lua_name, video_folder, loader)));
        let registration = if controller.borrow().lua_name.is_empty() {
            None
        } else {
            Some(state.add_restorable(&controller)?)
        };
        Ok((controller, registration))
    }

    pub fn current_video_name(&self) -> Option<&str> {
        self.current_video_name.as_deref()
    }

    pub fn clip(&self) -> Option<&AssetHandle> {
        self.clip.as_ref()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Switches to `video_name`; does nothing if it is already active
    pub fn set_video(&mut self, video_name: &str) -> Result<(), AssetError> {
        if self.current_video_name.as_deref() == Some(video_name) {
            return Ok(());
        }

        let clip = self.loader.load(&asset_path(&self.video_folder, video_name))?;
        self.clip = Some(clip);
        self.prepared = false;
        self.current_video_name = Some(video_name.to_string());
        Ok(())
    }

    pub fn clear_video(&mut self) {
        if self.current_video_name.is_none() {
            return;
        }

        self.clip = None;
        self.prepared = false;
        self.current_video_name = None;
    }

    /// Loads and prepares a clip ahead of time without making it current
    pub fn preload(&mut self, video_name: &str) -> Result<(), AssetError> {
        let clip = self.loader.load(&asset_path(&self.video_folder, video_name))?;
        self.clip = Some(clip);
        self.prepared = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRestoreData {
    pub current_video_name: Option<String>,
}

impl Restorable for VideoController {
    type Data = VideoRestoreData;
    const DATA_TYPE: &'static str = "video";

    fn restorable_name(&self) -> &str {
        &self.lua_name
    }

    fn priority(&self) -> RestorablePriority {
        RestorablePriority::Normal
    }

    fn get_restore_data(&self) -> Result<VideoRestoreData, RestorableError> {
        Ok(VideoRestoreData {
            current_video_name: self.current_video_name.clone(),
        })
    }

    fn restore(&mut self, data: VideoRestoreData) -> Result<(), RestorableError> {
        match data.current_video_name {
            Some(name) => self.set_video(&name)?,
            None => self.clear_video(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::CatalogAssetLoader;

    fn controller() -> (VideoController, Rc<CatalogAssetLoader>) {
        let loader = Rc::new(CatalogAssetLoader::with_assets(["Videos/op", "Videos/rain"]));
        (VideoController::new("bg_video", "Videos", loader.clone()), loader)
    }

    #[test]
    fn test_set_video_loads_once() {
        let (mut video, loader) = controller();

        video.set_video("op").unwrap();
        video.set_video("op").unwrap();

        assert_eq!(video.current_video_name(), Some("op"));
        assert_eq!(video.clip().unwrap().path(), "Videos/op");
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn test_set_video_unknown_clip_keeps_state() {
        let (mut video, _loader) = controller();
        video.set_video("op").unwrap();

        assert!(video.set_video("missing").is_err());
        assert_eq!(video.current_video_name(), Some("op"));
    }

    #[test]
    fn test_clear_video() {
        let (mut video, _loader) = controller();
        video.clear_video();
        assert!(video.current_video_name().is_none());

        video.set_video("rain").unwrap();
        video.clear_video();
        assert!(video.current_video_name().is_none());
        assert!(video.clip().is_none());
    }

    #[test]
    fn test_preload_does_not_change_current() {
        let (mut video, loader) = controller();
        video.preload("rain").unwrap();

        assert!(video.is_prepared());
        assert!(video.current_video_name().is_none());
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn test_restore_same_value_is_noop() {
        let (mut video, loader) = controller();
        video.set_video("op").unwrap();
        let data = video.get_restore_data().unwrap();

        video.restore(data).unwrap();
        assert_eq!(video.current_video_name(), Some("op"));
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn test_restore_none_clears() {
        let (mut video, _loader) = controller();
        video.set_video("op").unwrap();

        video
            .restore(VideoRestoreData {
                current_video_name: None,
            })
            .unwrap();
        assert!(video.current_video_name().is_none());
    }

    #[test]
    fn test_spawn_registers_only_named() {
        let state = GameState::new();
        let loader: Rc<dyn AssetLoader> = Rc::new(CatalogAssetLoader::new());

        let (_named, registration) =
            VideoController::spawn(&state, "bg_video", "Videos", loader.clone()).unwrap();
        assert!(registration.is_some());
        assert!(state.registry().contains("bg_video"));

        let (_unnamed, registration) = VideoController::spawn(&state, "", "Videos", loader).unwrap();
        assert!(registration.is_none());
        assert_eq!(state.registry().len(), 1);
    }
}
