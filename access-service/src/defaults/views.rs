//! Compiled-in subview templates per (role, module).

use crate::models::{MemberRole, ModuleViewConfig, RbacModule};

/// Named subviews each module exposes.
pub fn subviews(module: RbacModule) -> &'static [&'static str] {
    match module {
        RbacModule::Crm => &["pipeline", "contacts", "companies", "activities"],
        RbacModule::Projects => &["overview", "board", "budget", "time_tracking", "files"],
        RbacModule::Product => &["backlog", "specs", "releases"],
        RbacModule::Roadmap => &["timeline", "milestones", "history"],
        RbacModule::Tasks => &["list", "board", "calendar"],
        RbacModule::Notes => &["personal", "shared"],
        RbacModule::Documents => &["library", "templates", "shared"],
        RbacModule::Profitability => &["summary", "margins", "recommendations", "history"],
    }
}

fn hidden_for(role: MemberRole, module: RbacModule) -> &'static [&'static str] {
    match (role, module) {
        (MemberRole::Admin, _) => &[],
        (MemberRole::Member, RbacModule::Profitability) => &["margins", "recommendations"],
        (MemberRole::Member, _) => &[],
        (MemberRole::Guest, RbacModule::Crm) => &["companies"],
        (MemberRole::Guest, RbacModule::Projects) => &["budget", "time_tracking"],
        (MemberRole::Guest, RbacModule::Roadmap) => &["history"],
        (MemberRole::Guest, RbacModule::Profitability) => {
            &["margins", "recommendations", "history"]
        }
        (MemberRole::Guest, _) => &[],
    }
}

/// Built-in visibility template, listing every known subview explicitly.
pub fn role_template(role: MemberRole, module: RbacModule) -> ModuleViewConfig {
    let hidden = hidden_for(role, module);
    ModuleViewConfig::with_subviews(
        subviews(module)
            .iter()
            .map(|key| (*key, !hidden.contains(key))),
    )
}
