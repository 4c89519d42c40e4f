//! Privilege escalation configuration.
//!
//! Tasks run host commands that usually need root (`apt-get`, `systemctl`).
//! A playbook can declare a default escalation method under
//! `defaults.privilege`, and each task may inherit, require, disable, or
//! override it via its `privilege` key. Settings are resolved once at load
//! time; the resolved method is attached to every command the task spawns.

use serde::Deserialize;

use crate::error::HostprepError;

/// Privilege escalation method wrapped around spawned commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMethod {
    Sudo,
    Doas,
}

impl PrivilegeMethod {
    /// Returns the wrapper command name for this method.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Sudo => "sudo",
            Self::Doas => "doas",
        }
    }
}

impl std::fmt::Display for PrivilegeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}

/// Playbook-level privilege defaults (`defaults.privilege`).
#[derive(Debug, Clone, Deserialize)]
pub struct PrivilegeDefaults {
    /// The default escalation method for tasks that inherit or require one.
    pub method: PrivilegeMethod,
}

/// Per-task privilege setting.
///
/// YAML representations:
/// - absent → `Inherit` (use the playbook default if one is configured)
/// - `privilege: true` → `UseDefault` (require a default, error if missing)
/// - `privilege: false` → `Disabled`
/// - `privilege: { method: sudo }` → `Method(Sudo)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Privilege {
    #[default]
    Inherit,
    UseDefault,
    Disabled,
    Method(PrivilegeMethod),
}

impl Privilege {
    /// Resolves this setting against the playbook defaults.
    ///
    /// Returns `Some(method)` if commands should be escalated, `None` otherwise.
    ///
    /// # Errors
    ///
    /// `HostprepError::Validation` if `privilege: true` was given but the
    /// playbook configures no default method.
    pub fn resolve(
        &self,
        defaults: Option<&PrivilegeDefaults>,
    ) -> Result<Option<PrivilegeMethod>, HostprepError> {
        match self {
            Self::Inherit => Ok(defaults.map(|d| d.method)),
            Self::UseDefault => defaults.map(|d| Some(d.method)).ok_or_else(|| {
                HostprepError::Validation(
                    "privilege: true requires defaults.privilege.method to be configured"
                        .to_string(),
                )
            }),
            Self::Disabled => Ok(None),
            Self::Method(method) => Ok(Some(*method)),
        }
    }

    /// Resolves in place, collapsing `self` into `Method` or `Disabled`.
    pub fn resolve_in_place(
        &mut self,
        defaults: Option<&PrivilegeDefaults>,
    ) -> Result<(), HostprepError> {
        *self = match self.resolve(defaults)? {
            Some(method) => Self::Method(method),
            None => Self::Disabled,
        };
        Ok(())
    }

    /// Returns the method after resolution.
    ///
    /// `Some(method)` for `Method`, `None` for `Disabled` and `Inherit`.
    /// Calling this on `UseDefault` indicates a missed `resolve()`; it logs
    /// a warning and returns `None`.
    pub fn resolved_method(&self) -> Option<PrivilegeMethod> {
        match self {
            Self::Method(m) => Some(*m),
            Self::Disabled | Self::Inherit => None,
            Self::UseDefault => {
                tracing::warn!(
                    "resolved_method() called on UseDefault; resolve() was likely skipped"
                );
                None
            }
        }
    }
}

impl<'de> Deserialize<'de> for Privilege {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct PrivilegeVisitor;

        impl<'de> de::Visitor<'de> for PrivilegeVisitor {
            type Value = Privilege;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a boolean or a map with a 'method' field")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Privilege::Inherit)
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(if v {
                    Privilege::UseDefault
                } else {
                    Privilege::Disabled
                })
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct PrivilegeMap {
                    method: PrivilegeMethod,
                }
                let pm = PrivilegeMap::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(Privilege::Method(pm.method))
            }
        }

        deserializer.deserialize_any(PrivilegeVisitor)
    }
}
