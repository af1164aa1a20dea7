//! Discovery of samizdat definitions.
//!
//! One operation: `discover() -> Vec<Samizdat>`. Two adapters: an explicit
//! [`Registry`] for hosts that embed the library, and YAML
//! [`DefinitionFiles`](file::DefinitionFiles) for the standalone CLI.

pub mod file;

pub use file::DefinitionFiles;

use crate::error::SamizdatError;
use crate::samizdat::Samizdat;

pub trait Discovery {
    fn discover(&self) -> Result<Vec<Samizdat>, SamizdatError>;
}

/// Explicit registration, for hosted use: the embedding application
/// registers its samizdats once and hands the registry to a command.
#[derive(Debug, Default)]
pub struct Registry {
    samizdats: Vec<Samizdat>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, samizdat: Samizdat) -> &mut Self {
        self.samizdats.push(samizdat);
        self
    }

    pub fn extend(&mut self, samizdats: impl IntoIterator<Item = Samizdat>) -> &mut Self {
        self.samizdats.extend(samizdats);
        self
    }
}

impl Discovery for Registry {
    fn discover(&self) -> Result<Vec<Samizdat>, SamizdatError> {
        Ok(self.samizdats.clone())
    }
}
