//! Compile summary reporting.
//!
//! Pure presentation over what the walker accumulated: per tenant, the
//! compiled routes with method, path, handler name, and active hooks. Has no
//! effect on routing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::hooks::HookInfo;
use crate::compiler::lifecycle::LifecycleStage;

/// One compiled route as it appears in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub hooks: BTreeMap<LifecycleStage, HookInfo>,
}

impl RouteSummary {
    /// Compact rendering of the active hooks: `stage: [names]` per stage
    /// with at least one active hook, or `None`.
    pub fn hooks_cell(&self) -> String {
        let parts: Vec<String> = self
            .hooks
            .iter()
            .filter(|(_, info)| info.count > 0)
            .map(|(stage, info)| format!("{}: [{}]", stage, info.names.join(", ")))
            .collect();
        if parts.is_empty() {
            "None".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

/// One tenant's compiled routes.
#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub tenant: String,
    pub routes: Vec<RouteSummary>,
}

/// The full per-tenant compile summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileSummary {
    pub tenants: Vec<TenantSummary>,
}

impl CompileSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tenant(&mut self, tenant: &str, routes: Vec<RouteSummary>) {
        self.tenants.push(TenantSummary {
            tenant: tenant.to_string(),
            routes,
        });
    }

    pub fn tenant(&self, name: &str) -> Option<&TenantSummary> {
        self.tenants.iter().find(|t| t.tenant == name)
    }

    pub fn total_routes(&self) -> usize {
        self.tenants.iter().map(|t| t.routes.len()).sum()
    }
}

impl std::fmt::Display for CompileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const HEADERS: [&str; 4] = ["METHOD", "PATH", "HANDLER", "HOOKS"];

        for tenant in &self.tenants {
            writeln!(f)?;
            writeln!(f, "Tenant: {} ({} routes)", tenant.tenant, tenant.routes.len())?;

            let rows: Vec<[String; 4]> = tenant
                .routes
                .iter()
                .map(|route| {
                    [
                        route.method.clone(),
                        route.path.clone(),
                        route.handler.clone(),
                        route.hooks_cell(),
                    ]
                })
                .collect();

            let mut widths = HEADERS.map(str::len);
            for row in &rows {
                for (width, cell) in widths.iter_mut().zip(row.iter()) {
                    *width = (*width).max(cell.len());
                }
            }

            write_row(f, &HEADERS.map(str::to_string), &widths)?;
            for row in &rows {
                write_row(f, row, &widths)?;
            }
        }
        Ok(())
    }
}

fn write_row(
    f: &mut std::fmt::Formatter<'_>,
    row: &[String; 4],
    widths: &[usize; 4],
) -> std::fmt::Result {
    writeln!(
        f,
        "  {:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}",
        row[0],
        row[1],
        row[2],
        row[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::hooks::{normalize_hook_info, HookConfig};

    fn summary_entry(hooks: BTreeMap<LifecycleStage, HookInfo>) -> RouteSummary {
        RouteSummary {
            method: "GET".to_string(),
            path: "/blog/posts/read".to_string(),
            handler: "readResourceHandler".to_string(),
            hooks,
        }
    }

    #[test]
    fn test_hooks_cell_none_when_nothing_active() {
        let entry = summary_entry(normalize_hook_info(&HookConfig::new()));
        assert_eq!(entry.hooks_cell(), "None");
    }

    #[test]
    fn test_hooks_cell_lists_active_stages_in_order() {
        let mut hooks = normalize_hook_info(&HookConfig::new());
        hooks.insert(
            LifecycleStage::OnSend,
            HookInfo {
                count: 1,
                names: vec!["cacheOnSendHook".into()],
            },
        );
        hooks.insert(
            LifecycleStage::OnRequest,
            HookInfo {
                count: 2,
                names: vec!["messageControlHook".into(), "logRequest".into()],
            },
        );
        let entry = summary_entry(hooks);
        assert_eq!(
            entry.hooks_cell(),
            "onRequest: [messageControlHook, logRequest] | onSend: [cacheOnSendHook]"
        );
    }

    #[test]
    fn test_display_renders_tenant_header_and_rows() {
        let mut summary = CompileSummary::new();
        summary.push_tenant(
            "blog",
            vec![summary_entry(normalize_hook_info(&HookConfig::new()))],
        );
        let rendered = summary.to_string();
        assert!(rendered.contains("Tenant: blog (1 routes)"));
        assert!(rendered.contains("METHOD"));
        assert!(rendered.contains("/blog/posts/read"));
        assert!(rendered.contains("readResourceHandler"));
        assert!(rendered.contains("None"));
        assert_eq!(summary.total_routes(), 1);
    }
}
