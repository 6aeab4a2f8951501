//! Interactive input for credentials and group selection

use crate::Result;
use dialoguer::{theme::ColorfulTheme, Input, Password, Select};
use fivetran_client::Group;

/// Source of the values an import needs from the user
pub trait InputProvider: Send + Sync {
    fn api_key(&self) -> Result<String>;

    fn api_secret(&self) -> Result<String>;

    /// 1-based position of the chosen group in `groups`
    fn group_index(&self, groups: &[Group]) -> Result<usize>;
}

/// Terminal prompts
pub struct ConsoleInput {
    theme: ColorfulTheme,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputProvider for ConsoleInput {
    fn api_key(&self) -> Result<String> {
        let key: String = Input::with_theme(&self.theme)
            .with_prompt("Fivetran API key")
            .interact_text()?;
        Ok(key)
    }

    fn api_secret(&self) -> Result<String> {
        let secret = Password::with_theme(&self.theme)
            .with_prompt("Fivetran API secret")
            .interact()?;
        Ok(secret)
    }

    fn group_index(&self, groups: &[Group]) -> Result<usize> {
        let labels: Vec<String> = groups.iter().map(group_label).collect();
        let selection = Select::with_theme(&self.theme)
            .with_prompt("Select a group to import")
            .items(&labels)
            .default(0)
            .interact()?;
        Ok(selection + 1)
    }
}

/// Menu line for one group
fn group_label(group: &Group) -> String {
    format!("{} (ID: {})", group.name, group.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_label_shows_name_and_id() {
        let group = Group {
            id: "grp_finance".to_string(),
            name: "Finance".to_string(),
        };
        assert_eq!(group_label(&group), "Finance (ID: grp_finance)");
    }
}
