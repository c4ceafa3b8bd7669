//! Read-only permission pack catalogue.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::models::{ModulePermissions, PackModule, PermissionPack, RbacModule};

use super::views::subviews;

const CONTRIBUTE: ModulePermissions = ModulePermissions {
    read: true,
    create: true,
    update: true,
    delete: false,
};

static CATALOG: Lazy<Vec<PermissionPack>> = Lazy::new(build_catalog);

pub fn catalog() -> &'static [PermissionPack] {
    &CATALOG
}

pub fn find(pack_id: &str) -> Option<&'static PermissionPack> {
    CATALOG.iter().find(|p| p.pack_id == pack_id)
}

/// All subviews of `module` visible except `hidden`.
fn visible_except(module: RbacModule, hidden: &[&str]) -> BTreeMap<String, bool> {
    subviews(module)
        .iter()
        .map(|key| (key.to_string(), !hidden.contains(key)))
        .collect()
}

fn grant(
    module: RbacModule,
    actions: ModulePermissions,
    hidden: &[&str],
) -> (RbacModule, PackModule) {
    (
        module,
        PackModule {
            actions,
            default_subviews: visible_except(module, hidden),
        },
    )
}

fn pack(
    pack_id: &str,
    version: u32,
    label: &str,
    description: &str,
    modules: Vec<(RbacModule, PackModule)>,
) -> PermissionPack {
    PermissionPack {
        pack_id: pack_id.to_string(),
        version,
        label: label.to_string(),
        description: description.to_string(),
        modules: modules.into_iter().collect(),
    }
}

fn build_catalog() -> Vec<PermissionPack> {
    vec![
        pack(
            "full_access",
            1,
            "Full access",
            "Every action on every module, all subviews visible.",
            RbacModule::ALL
                .into_iter()
                .map(|m| grant(m, ModulePermissions::FULL, &[]))
                .collect(),
        ),
        pack(
            "sales",
            2,
            "Sales",
            "Runs the pipeline: full CRM, contributes documents and notes, reads projects.",
            vec![
                grant(RbacModule::Crm, ModulePermissions::FULL, &[]),
                grant(RbacModule::Documents, CONTRIBUTE, &[]),
                grant(RbacModule::Notes, CONTRIBUTE, &[]),
                grant(
                    RbacModule::Projects,
                    ModulePermissions::READ_ONLY,
                    &["budget", "time_tracking"],
                ),
            ],
        ),
        pack(
            "delivery",
            1,
            "Delivery",
            "Ships the work: projects, tasks, product and roadmap, without budgets.",
            vec![
                grant(RbacModule::Projects, CONTRIBUTE, &["budget"]),
                grant(RbacModule::Tasks, ModulePermissions::FULL, &[]),
                grant(RbacModule::Product, CONTRIBUTE, &[]),
                grant(RbacModule::Roadmap, CONTRIBUTE, &[]),
                grant(RbacModule::Notes, CONTRIBUTE, &[]),
                grant(RbacModule::Documents, CONTRIBUTE, &[]),
            ],
        ),
        pack(
            "finance",
            1,
            "Finance",
            "Owns profitability, reads projects and CRM including budgets.",
            vec![
                grant(RbacModule::Profitability, ModulePermissions::FULL, &[]),
                grant(RbacModule::Projects, ModulePermissions::READ_ONLY, &[]),
                grant(RbacModule::Crm, ModulePermissions::READ_ONLY, &["activities"]),
            ],
        ),
        pack(
            "read_only",
            1,
            "Read only",
            "Reads every module except profitability.",
            RbacModule::ALL
                .into_iter()
                .filter(|m| *m != RbacModule::Profitability)
                .map(|m| grant(m, ModulePermissions::READ_ONLY, &[]))
                .collect(),
        ),
        pack(
            "client_guest",
            1,
            "Client guest",
            "External client: reads projects and roadmap, no financial subviews.",
            vec![
                grant(
                    RbacModule::Projects,
                    ModulePermissions::READ_ONLY,
                    &["budget", "time_tracking"],
                ),
                grant(RbacModule::Roadmap, ModulePermissions::READ_ONLY, &["history"]),
                grant(RbacModule::Documents, ModulePermissions::READ_ONLY, &["templates"]),
                grant(
                    RbacModule::Profitability,
                    ModulePermissions::NONE,
                    &["summary", "margins", "recommendations", "history"],
                ),
            ],
        ),
    ]
}
