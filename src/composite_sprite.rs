//! Composite sprite layer
//!
//! A character standing is drawn from several sprite layers named by a pose
//! string, e.g. `body+face_smile+arm_raise`. Pose changes can cross-fade from
//! the previous textures; the fade itself is rendered elsewhere, this
//! component only records that one was requested.

use crate::assets::{AssetCacheType, AssetHandle, AssetLoader, asset_path};
use crate::game_state::{GameState, PlaybackFlags};
use crate::restoration::{
    AssetError, Registration, RegistryError, Restorable, RestorableError, RestorablePriority,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

pub const POSE_STRING_SEPARATOR: char = '+';

/// Render queue used until something overrides it
pub const DEFAULT_RENDER_QUEUE: i32 = 3000;

/// Layer value meaning "ignore the camera's culling mask"
pub const UNCULLED_LAYER: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub position: [f32; 3],
    /// Quaternion, `[x, y, z, w]`
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for TransformData {
    fn default() -> Self {
        TransformData {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Set of sprite textures merged into one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteMerger {
    sprites: Vec<AssetHandle>,
}

impl SpriteMerger {
    pub fn set_textures(&mut self, sprites: Vec<AssetHandle>) {
        self.sprites = sprites;
    }

    pub fn copy_from(&mut self, other: &SpriteMerger) {
        self.sprites = other.sprites.clone();
    }

    pub fn sprites(&self) -> &[AssetHandle] {
        &self.sprites
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }
}

/// A requested cross-fade that has not finished yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTransition {
    pub duration: f32,
}

/// Joins sprite layer names into a pose string
pub fn array_to_pose<I, S>(layers: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pose = String::new();
    for (i, layer) in layers.into_iter().enumerate() {
        if i > 0 {
            pose.push(POSE_STRING_SEPARATOR);
        }
        pose.push_str(layer.as_ref());
    }
    pose
}

/// Splits a pose string into layer names; the empty pose has none
pub fn pose_to_array(pose: &str) -> Vec<&str> {
    if pose.is_empty() {
        Vec::new()
    } else {
        pose.split(POSE_STRING_SEPARATOR).collect()
    }
}

pub fn load_sprites(
    loader: &dyn AssetLoader,
    image_folder: &str,
    pose: &str,
) -> Result<Vec<AssetHandle>, AssetError> {
    pose_to_array(pose)
        .into_iter()
        .map(|layer| loader.load(&asset_path(image_folder, layer)))
        .collect()
}

pub struct CompositeSpriteController {
    global_name: String,
    image_folder: String,
    current_pose: String,
    transform: TransformData,
    color: Color,
    render_queue: i32,
    layer: i32,
    merger_primary: SpriteMerger,
    merger_sub: SpriteMerger,
    fade_duration: f32,
    pending_fade: Option<FadeTransition>,
    loader: Rc<dyn AssetLoader>,
    flags: Rc<PlaybackFlags>,
}

impl CompositeSpriteController {
    pub fn new(
        global_name: impl Into<String>,
        image_folder: impl Into<String>,
        loader: Rc<dyn AssetLoader>,
        flags: Rc<PlaybackFlags>,
    ) -> Self {
        CompositeSpriteController {
            global_name: global_name.into(),
            image_folder: image_folder.into(),
            current_pose: String::new(),
            transform: TransformData::default(),
            color: Color::default(),
            render_queue: DEFAULT_RENDER_QUEUE,
            layer: UNCULLED_LAYER,
            merger_primary: SpriteMerger::default(),
            merger_sub: SpriteMerger::default(),
            fade_duration: 0.1,
            pending_fade: None,
            loader,
            flags,
        }
    }

    /// Creates a shared controller, registering it if it has a script name
    pub fn spawn(
        state: &GameState,
        global_name: impl Into<String>,
        image_folder: impl Into<String>,
        loader: Rc<dyn AssetLoader>,
    ) -> Result<(Rc<RefCell<Self>>, Option<Registration>), RegistryError> {
        let controller = Rc::new(RefCell::new(Self::new(
            global_name,
            image_folder,
            loader,
            state.flags(),
        )));
        let registration = if controller.borrow().global_name.is_empty() {
            None
        } else {
            Some(state.add_restorable(&controller)?)
        };
        Ok((controller, registration))
    }

    pub fn set_fade_duration(&mut self, fade_duration: f32) {
        self.fade_duration = fade_duration;
    }

    pub fn current_pose(&self) -> &str {
        &self.current_pose
    }

    pub fn transform(&self) -> &TransformData {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: TransformData) {
        self.transform = transform;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn render_queue(&self) -> i32 {
        self.render_queue
    }

    pub fn set_render_queue(&mut self, render_queue: i32) {
        self.render_queue = render_queue;
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn primary_sprites(&self) -> &[AssetHandle] {
        self.merger_primary.sprites()
    }

    pub fn pending_fade(&self) -> Option<FadeTransition> {
        self.pending_fade
    }

    pub fn is_fading(&self) -> bool {
        self.pending_fade.is_some()
    }

    /// Called by the renderer once the cross-fade has played out
    pub fn finish_fade(&mut self) {
        self.pending_fade = None;
        self.merger_sub.set_textures(Vec::new());
    }

    pub fn need_render(&self) -> bool {
        self.merger_primary.sprite_count() > 0
            || (self.is_fading() && self.merger_sub.sprite_count() > 0)
    }

    /// Switches to `pose`; does nothing if it is already current
    ///
    /// Fading is skipped while restoring or fast-forwarding, and a change
    /// without a fade drops any fade still running. If any layer fails to
    /// load, the current pose is kept.
    pub fn set_pose_with_duration(
        &mut self,
        pose: &str,
        fade: bool,
        duration: f32,
    ) -> Result<(), AssetError> {
        if pose == self.current_pose {
            return Ok(());
        }

        let fade = fade && !self.flags.is_restoring() && !self.flags.is_fast_forward();
        let sprites = load_sprites(&*self.loader, &self.image_folder, pose)?;

        if fade {
            self.merger_sub.copy_from(&self.merger_primary);
            self.pending_fade = Some(FadeTransition { duration });
        } else {
            self.finish_fade();
        }
        self.merger_primary.set_textures(sprites);

        self.current_pose = pose.to_string();
        Ok(())
    }

    pub fn set_pose(&mut self, pose: &str, fade: bool) -> Result<(), AssetError> {
        self.set_pose_with_duration(pose, fade, self.fade_duration)
    }

    pub fn clear_image_with_duration(&mut self, fade: bool, duration: f32) -> Result<(), AssetError> {
        self.set_pose_with_duration("", fade, duration)
    }

    pub fn clear_image(&mut self, fade: bool) -> Result<(), AssetError> {
        self.set_pose_with_duration("", fade, self.fade_duration)
    }

    pub fn preload(&self, cache_type: AssetCacheType, pose: &str) {
        for layer in pose_to_array(pose) {
            self.loader
                .preload(cache_type, &asset_path(&self.image_folder, layer));
        }
    }

    pub fn unpreload(&self, cache_type: AssetCacheType, pose: &str) {
        for layer in pose_to_array(pose) {
            self.loader
                .unpreload(cache_type, &asset_path(&self.image_folder, layer));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSpriteRestoreData {
    pub pose: String,
    pub transform: TransformData,
    pub color: Color,
    pub render_queue: i32,
    pub layer: i32,
}

impl Restorable for CompositeSpriteController {
    type Data = CompositeSpriteRestoreData;
    const DATA_TYPE: &'static str = "composite_sprite";

    fn restorable_name(&self) -> &str {
        &self.global_name
    }

    fn priority(&self) -> RestorablePriority {
        RestorablePriority::Normal
    }

    fn get_restore_data(&self) -> Result<CompositeSpriteRestoreData, RestorableError> {
        Ok(CompositeSpriteRestoreData {
            pose: self.current_pose.clone(),
            transform: self.transform,
            color: self.color,
            render_queue: self.render_queue,
            layer: self.layer,
        })
    }

    /// Nothing changes unless every sprite layer of the saved pose loads
    fn restore(&mut self, data: CompositeSpriteRestoreData) -> Result<(), RestorableError> {
        if data.pose != self.current_pose {
            let sprites = load_sprites(&*self.loader, &self.image_folder, &data.pose)?;
            self.merger_primary.set_textures(sprites);
            self.current_pose = data.pose;
        }
        self.finish_fade();

        self.transform = data.transform;
        self.color = data.color;
        self.render_queue = data.render_queue;
        self.layer = data.layer;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::CatalogAssetLoader;

    fn loader() -> Rc<CatalogAssetLoader> {
        Rc::new(CatalogAssetLoader::with_assets([
            "Standings/alice/body",
            "Standings/alice/smile",
            "Standings/alice/frown",
        ]))
    }

    fn controller(loader: &Rc<CatalogAssetLoader>, flags: &Rc<PlaybackFlags>) -> CompositeSpriteController {
        CompositeSpriteController::new("alice", "Standings/alice", loader.clone(), flags.clone())
    }

    #[test]
    fn test_pose_string_helpers() {
        assert_eq!(array_to_pose(["body", "smile"]), "body+smile");
        assert_eq!(array_to_pose(Vec::<String>::new()), "");
        assert_eq!(pose_to_array("body+smile"), vec!["body", "smile"]);
        assert!(pose_to_array("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let sprite = controller(&loader, &flags);

        assert_eq!(sprite.layer(), UNCULLED_LAYER);
        assert_eq!(sprite.render_queue(), DEFAULT_RENDER_QUEUE);
        assert_eq!(sprite.color(), Color::WHITE);
        assert!(!sprite.need_render());
    }

    #[test]
    fn test_set_pose_with_fade() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);

        sprite.set_pose("body+smile", false).unwrap();
        assert!(!sprite.is_fading());

        sprite.set_pose_with_duration("body+frown", true, 0.5).unwrap();
        assert_eq!(sprite.pending_fade(), Some(FadeTransition { duration: 0.5 }));
        assert_eq!(sprite.primary_sprites()[1].path(), "Standings/alice/frown");
        assert!(sprite.need_render());

        sprite.finish_fade();
        assert!(!sprite.is_fading());
    }

    #[test]
    fn test_same_pose_is_noop() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);

        sprite.set_pose("body+smile", false).unwrap();
        sprite.set_pose("body+smile", true).unwrap();
        assert_eq!(loader.load_count(), 2);
        assert!(!sprite.is_fading());
    }

    #[test]
    fn test_fade_suppressed_while_fast_forwarding() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);

        flags.set_fast_forward(true);
        sprite.set_pose("body", true).unwrap();
        assert!(!sprite.is_fading());
    }

    #[test]
    fn test_failed_layer_keeps_pose() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body+smile", false).unwrap();

        assert!(sprite.set_pose("body+missing", false).is_err());
        assert_eq!(sprite.current_pose(), "body+smile");
        assert_eq!(sprite.primary_sprites().len(), 2);
    }

    #[test]
    fn test_clear_image() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body", false).unwrap();

        sprite.clear_image(true).unwrap();
        assert_eq!(sprite.current_pose(), "");
        assert!(sprite.primary_sprites().is_empty());
        // Previous texture is still shown while fading out
        assert!(sprite.need_render());
    }

    #[test]
    fn test_preload_and_unpreload_each_layer() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let sprite = controller(&loader, &flags);

        sprite.preload(AssetCacheType::StandingLayer, "body+smile");
        assert_eq!(
            loader.preload_count(AssetCacheType::StandingLayer, "Standings/alice/smile"),
            1
        );

        sprite.unpreload(AssetCacheType::StandingLayer, "body+smile");
        assert_eq!(
            loader.preload_count(AssetCacheType::StandingLayer, "Standings/alice/body"),
            0
        );
        assert_eq!(loader.load_count(), 0);
    }

    #[test]
    fn test_restore_applies_everything_without_fade() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);

        let data = CompositeSpriteRestoreData {
            pose: "body+frown".to_string(),
            transform: TransformData {
                position: [1.0, 2.0, 0.0],
                ..TransformData::default()
            },
            color: Color::new(0.5, 0.5, 0.5, 1.0),
            render_queue: 3100,
            layer: 8,
        };
        sprite.restore(data.clone()).unwrap();

        assert!(!sprite.is_fading());
        assert_eq!(sprite.get_restore_data().unwrap(), data);
    }

    fn restore_data(pose: &str) -> CompositeSpriteRestoreData {
        CompositeSpriteRestoreData {
            pose: pose.to_string(),
            transform: TransformData {
                position: [9.0, 0.0, 0.0],
                ..TransformData::default()
            },
            color: Color::new(0.2, 0.2, 0.2, 1.0),
            render_queue: 4000,
            layer: 7,
        }
    }

    #[test]
    fn test_restore_cancels_running_fade() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body", false).unwrap();
        sprite.set_pose("body+smile", true).unwrap();
        assert!(sprite.is_fading());

        sprite.restore(restore_data("body+frown")).unwrap();
        assert!(!sprite.is_fading());
        assert_eq!(sprite.current_pose(), "body+frown");
    }

    #[test]
    fn test_restore_same_pose_cancels_running_fade() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body", false).unwrap();
        sprite.set_pose("body+smile", true).unwrap();
        let loads = loader.load_count();

        sprite.restore(restore_data("body+smile")).unwrap();
        assert!(!sprite.is_fading());
        assert_eq!(sprite.layer(), 7);
        assert_eq!(loader.load_count(), loads);
    }

    #[test]
    fn test_unfaded_pose_change_drops_old_fade() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body", false).unwrap();
        sprite.set_pose("body+smile", true).unwrap();

        sprite.set_pose("body+frown", false).unwrap();
        assert!(!sprite.is_fading());
    }

    #[test]
    fn test_failed_restore_changes_nothing() {
        let loader = loader();
        let flags = PlaybackFlags::new();
        let mut sprite = controller(&loader, &flags);
        sprite.set_pose("body", false).unwrap();
        let before = sprite.get_restore_data().unwrap();

        let err = sprite.restore(restore_data("body+wink")).unwrap_err();
        assert!(matches!(err, RestorableError::Asset(AssetError::NotFound(_))));
        assert_eq!(sprite.get_restore_data().unwrap(), before);
    }
}
