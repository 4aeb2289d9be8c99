use crate::{PoUploadError, Result};
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use serde::Serialize;

/// What to do with a file that already exists on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Overwrite,
    Skip,
}

/// Decides collisions. Implementations may block, e.g. waiting on a person.
pub trait CollisionResolver {
    fn decide(&mut self, file_name: &str) -> Result<Resolution>;
}

impl<F> CollisionResolver for F
where
    F: FnMut(&str) -> Result<Resolution>,
{
    fn decide(&mut self, file_name: &str) -> Result<Resolution> {
        self(file_name)
    }
}

/// Same answer for every collision.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub Resolution);

impl CollisionResolver for FixedResolver {
    fn decide(&mut self, _file_name: &str) -> Result<Resolution> {
        Ok(self.0)
    }
}

/// Asks on the terminal. Declining, or a prompt that cannot be shown, never
/// turns into an overwrite.
#[derive(Debug, Default)]
pub struct PromptResolver;

impl CollisionResolver for PromptResolver {
    fn decide(&mut self, file_name: &str) -> Result<Resolution> {
        let overwrite = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} exists on the server. Overwrite?", file_name))
            .default(false)
            .interact()
            .map_err(|e| PoUploadError::Resolver(format!("{}: prompt failed: {}", file_name, e)))?;

        Ok(if overwrite { Resolution::Overwrite } else { Resolution::Skip })
    }
}
