use std::path::{Path, PathBuf};

use crate::{
    render::{
        backend::CubeMapBackend,
        cube_map::{CubeMap, CubeMapLoader, CubeMapResult},
        image::Image,
    },
    util::cube::CubeFaces,
};

/// Size of the solid stand-in used when a sky cannot be loaded.
pub const FALLBACK_FACE_SIZE: u32 = 16;

/// A position in `0..len` that wraps around at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkyboxCycle {
    index: usize,
    len: usize,
}

impl SkyboxCycle {
    /// Returns [`None`] for an empty cycle.
    pub fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self { index: 0, len })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn next(&mut self) -> usize {
        self.index = (self.index + 1) % self.len;
        self.index
    }

    pub fn previous(&mut self) -> usize {
        self.index = (self.index + self.len - 1) % self.len;
        self.index
    }
}

/// The six image files of a sky stored in one directory.
pub struct SkyboxFiles;

impl SkyboxFiles {
    pub const NAMES: CubeFaces<&'static str> = CubeFaces {
        positive_x: "left.png",
        negative_x: "right.png",
        positive_y: "bottom.png",
        negative_y: "top.png",
        positive_z: "back.png",
        negative_z: "front.png",
    };

    pub fn from_directory(dir: impl AsRef<Path>) -> CubeFaces<PathBuf> {
        let dir = dir.as_ref();
        Self::NAMES.map(|_, name| dir.join(name))
    }
}

/// Loads the sky in `dir`, or a solid `fallback` coloured cube map if that
/// fails. The load error is logged once.
pub fn load_or_solid<B: CubeMapBackend>(
    loader: &CubeMapLoader<B>,
    backend: &B,
    dir: impl AsRef<Path>,
    fallback: [u8; 4],
) -> CubeMapResult<CubeMap<B>> {
    let dir = dir.as_ref();
    match loader.load_files(backend, SkyboxFiles::from_directory(dir)) {
        Ok(cube_map) => Ok(cube_map),
        Err(err) => {
            log::warn!(
                "Sky {} unavailable, using a solid colour instead: {err}",
                dir.display()
            );
            let faces = CubeFaces::from_fn(|_| {
                Image::solid(FALLBACK_FACE_SIZE, FALLBACK_FACE_SIZE, fallback)
            });
            loader.load_images(backend, faces)
        }
    }
}

/// Named cube maps in display order with one of them active.
pub struct SkyboxSet<B: CubeMapBackend> {
    skies: Vec<(String, CubeMap<B>)>,
    cycle: SkyboxCycle,
}

impl<B: CubeMapBackend> SkyboxSet<B> {
    /// Returns [`None`] if `skies` is empty.
    pub fn new(skies: Vec<(String, CubeMap<B>)>) -> Option<Self> {
        let cycle = SkyboxCycle::new(skies.len())?;
        Some(Self { skies, cycle })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.skies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.skies.is_empty()
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.cycle.index()
    }

    #[inline]
    pub fn active(&self) -> &CubeMap<B> {
        &self.skies[self.cycle.index()].1
    }

    #[inline]
    pub fn active_name(&self) -> &str {
        &self.skies[self.cycle.index()].0
    }

    pub fn next(&mut self) -> &CubeMap<B> {
        self.cycle.next();
        self.log_active();
        self.active()
    }

    pub fn previous(&mut self) -> &CubeMap<B> {
        self.cycle.previous();
        self.log_active();
        self.active()
    }

    fn log_active(&self) {
        log::info!(
            "Sky {}/{}: {}",
            self.cycle.index() + 1,
            self.len(),
            self.active_name()
        );
    }
}
