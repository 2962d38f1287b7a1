// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::AppResult;
use crate::app::ports::CatalogStorePort;
use crate::app::types::{
    ConnectionProfile, ParamResolutionIssue, ParameterRef, ProfileConfig, ResolvedConfig,
    ResolvedParams,
};

/// Resolves `{id, value}` references into a `name -> value` mapping, keeping
/// reference order. A failed lookup is recorded as an issue and skipped.
pub async fn resolve_parameters(
    catalog: &dyn CatalogStorePort,
    refs: &[ParameterRef],
) -> ResolvedParams {
    let mut resolved = ResolvedParams::default();
    for param in refs {
        match catalog.get_parameter_name(param.id).await {
            Ok(name) => {
                resolved.values.insert(name, param.value.clone());
            }
            Err(err) => {
                tracing::warn!(parameter_id = param.id, error = %err, "parameter lookup failed");
                resolved.issues.push(ParamResolutionIssue {
                    parameter_id: param.id,
                    message: err.to_string(),
                });
            }
        }
    }
    resolved
}

/// Decodes a profile blob into a flat mapping. Direct objects never produce issues.
pub async fn resolve_profile_values(
    catalog: &dyn CatalogStorePort,
    profile: &ConnectionProfile,
) -> AppResult<ResolvedParams> {
    match ProfileConfig::parse(&profile.config)
        .map_err(|err| err.with_context(format!("profile {}", profile.id)))?
    {
        ProfileConfig::References(refs) => Ok(resolve_parameters(catalog, &refs).await),
        ProfileConfig::Direct(values) => Ok(ResolvedParams {
            values,
            issues: Vec::new(),
        }),
    }
}

/// Builds the connection settings of a LocalConnection/ExternalRunner profile.
pub async fn resolve_connection(
    catalog: &dyn CatalogStorePort,
    profile: &ConnectionProfile,
) -> AppResult<(ResolvedConfig, Vec<ParamResolutionIssue>)> {
    let resolved = resolve_profile_values(catalog, profile).await?;
    let config = ResolvedConfig::from_mapping(&resolved.values)
        .map_err(|err| err.with_context(format!("profile '{}'", profile.name)))?;
    Ok((config, resolved.issues))
}
