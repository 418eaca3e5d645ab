use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use readerview_core::{ContentProvider, PageContent, PageHooks, Size};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageSpec {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub label: String,
}

/// Page list read from a TOML file with one `[[pages]]` table per page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read page manifest {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse page manifest {:?}", path))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(raw)?;
        if let Some(bad) = manifest
            .pages
            .iter()
            .position(|page| page.width <= 0 || page.height <= 0)
        {
            return Err(anyhow!("page {} has a non-positive size", bad + 1));
        }
        Ok(manifest)
    }

    pub fn uniform(count: usize, size: Size) -> Self {
        Self {
            pages: (0..count)
                .map(|_| PageSpec {
                    width: size.width,
                    height: size.height,
                    label: String::new(),
                })
                .collect(),
        }
    }
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_page_size(raw: &str) -> Result<Size, String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", raw))?;
    let width: i32 = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width {:?}: {}", width, err))?;
    let height: i32 = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height {:?}: {}", height, err))?;
    if width <= 0 || height <= 0 {
        return Err("page size must be positive".to_string());
    }
    Ok(Size::new(width, height))
}

/// What the viewer keeps per materialized page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTile {
    pub label: String,
    pub settled: bool,
    pub scale: f32,
}

impl PageTile {
    pub fn caption(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("{}", index + 1)
        } else {
            format!("{} {}", index + 1, self.label)
        }
    }
}

pub struct ManifestProvider {
    manifest: Manifest,
}

impl ManifestProvider {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }
}

impl ContentProvider for ManifestProvider {
    type Content = PageTile;

    fn count(&self) -> usize {
        self.manifest.pages.len()
    }

    fn page_content(&mut self, index: usize, recycled: Option<PageTile>) -> PageContent<PageTile> {
        let spec = &self.manifest.pages[index];
        let content = match recycled {
            Some(mut tile) => {
                tile.label.clone_from(&spec.label);
                tile.settled = false;
                tile.scale = 1.0;
                tile
            }
            None => PageTile {
                label: spec.label.clone(),
                settled: false,
                scale: 1.0,
            },
        };
        PageContent {
            content,
            natural_size: Size::new(spec.width, spec.height),
        }
    }
}

/// Keeps each tile's settled flag and reflow scale in step with the view.
#[derive(Debug, Default)]
pub struct TileHooks;

impl PageHooks<PageTile> for TileHooks {
    fn on_settle(&mut self, index: usize, content: &mut PageTile) {
        debug!(index, "page settled");
        content.settled = true;
    }

    fn on_unsettle(&mut self, _index: usize, content: &mut PageTile) {
        content.settled = false;
    }

    fn on_not_in_use(&mut self, _index: usize, content: &mut PageTile) {
        content.settled = false;
    }

    fn on_scale_child(&mut self, _index: usize, content: &mut PageTile, scale: f32) {
        content.scale = scale;
    }
}
