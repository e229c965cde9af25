use std::fmt;

/// A client-side resource a block needs on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Asset {
    Script(String),
    Stylesheet(String),
}

impl Asset {
    pub fn script(path: impl Into<String>) -> Self {
        Asset::Script(path.into())
    }

    pub fn stylesheet(path: impl Into<String>) -> Self {
        Asset::Stylesheet(path.into())
    }

    pub fn path(&self) -> &str {
        match self {
            Asset::Script(path) | Asset::Stylesheet(path) => path,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Script(path) => write!(f, "<script src=\"{}\"></script>", path),
            Asset::Stylesheet(path) => {
                write!(f, "<link rel=\"stylesheet\" href=\"{}\">", path)
            }
        }
    }
}

/// Ordered, duplicate-free asset list. The first declaration of an asset wins
/// its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Media {
    assets: Vec<Asset>,
}

impl Media {
    pub fn new() -> Self {
        Media::default()
    }

    pub fn scripts<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        let mut media = Media::new();
        for path in paths {
            media.push(Asset::script(path));
        }
        media
    }

    pub fn push(&mut self, asset: Asset) {
        if !self.assets.contains(&asset) {
            self.assets.push(asset);
        }
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Asset>) {
        for asset in other {
            self.push(asset);
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// One tag per line, stylesheets first.
    pub fn render(&self) -> String {
        let styles = self
            .assets
            .iter()
            .filter(|a| matches!(a, Asset::Stylesheet(_)));
        let scripts = self.assets.iter().filter(|a| matches!(a, Asset::Script(_)));
        styles
            .chain(scripts)
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl IntoIterator for Media {
    type Item = Asset;
    type IntoIter = std::vec::IntoIter<Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.into_iter()
    }
}
