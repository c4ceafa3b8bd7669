pub mod config_entry;
pub mod membership;
pub mod module_view;
pub mod permission_pack;
pub mod rbac;

pub use config_entry::{
    ConfigContext, ConfigKey, ConfigValue, RegistryEntry, RegistryScope, SourceTag,
};
pub use membership::{MemberRole, Membership};
pub use module_view::{MemberViewOverride, ModuleViewConfig, RoleViewTemplate};
pub use permission_pack::{PackModule, PermissionPack};
pub use rbac::{ModulePermissions, PermissionMatrix, RbacAction, RbacModule};
