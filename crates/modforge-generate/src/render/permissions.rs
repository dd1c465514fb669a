use std::fmt::Write;

use super::GENERATED_HEADER;
use crate::errors::Result;
use crate::module::ModuleModel;

/// Permission actions of every module, with their constant suffix.
pub const PERMISSION_ACTIONS: [(&str, &str); 9] = [
    ("findAll", "FIND_ALL"),
    ("findOne", "FIND_ONE"),
    ("create", "CREATE"),
    ("update", "UPDATE"),
    ("publish", "PUBLISH"),
    ("softDelete", "SOFT_DELETE"),
    ("rollback", "ROLLBACK"),
    ("hardDelete", "HARD_DELETE"),
    ("updatePermission", "UPDATE_PERMISSION"),
];

/// `admin::<Class>::<action>`
pub fn permission_slug(class_name: &str, action: &str) -> String {
    format!("admin::{class_name}::{action}")
}

pub(super) fn render(model: &ModuleModel) -> Result<String> {
    let class = &model.entity.class_name;
    let mut out = String::from(GENERATED_HEADER);
    writeln!(out, "//! {class} permission slugs.")?;
    writeln!(out)?;
    writeln!(out, "pub const MODULE: &str = {class:?};")?;
    writeln!(out)?;

    let mut names = Vec::with_capacity(PERMISSION_ACTIONS.len());
    for (action, suffix) in PERMISSION_ACTIONS {
        let name = format!("ADMIN_{}_{suffix}", model.entity.constant);
        writeln!(
            out,
            "pub const {name}: &str = {:?};",
            permission_slug(class, action)
        )?;
        names.push(name);
    }

    writeln!(out)?;
    writeln!(out, "pub const ALL: &[&str] = &[")?;
    for name in names {
        writeln!(out, "    {name},")?;
    }
    writeln!(out, "];")?;
    Ok(out)
}
