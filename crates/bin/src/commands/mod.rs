//! Subcommand implementations.

pub mod init;
pub mod ordering;
pub mod resource;
pub mod view;

use sorteia::Scope;

/// Build the scope for `resource_type`, failing when no owner was given.
pub fn scope_for(owner: Option<&str>, resource_type: &str) -> Result<Scope, String> {
    let owner = owner.ok_or("this command requires --owner or SORTEIA_OWNER")?;
    if owner.is_empty() {
        return Err("owner must not be empty".to_string());
    }
    Ok(Scope::new(owner, resource_type))
}
