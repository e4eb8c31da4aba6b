use switchboard_auth::Principal;
use switchboard_catalog::{Catalog, ModelQuery, ModelTarget};

use crate::error::RouterError;

/// Pick one model for a tag query
///
/// The catalog applies activity, tag-superset, and provider-type filters;
/// this layer drops candidates the principal's credential forbids and
/// then picks the lexicographic minimum of `(provider_name, model_name)`.
/// The deterministic tie-break keeps routing reproducible; a weighted
/// selector can replace the final fold without touching the filters.
pub fn select_candidate(
    catalog: &Catalog,
    query: &ModelQuery,
    principal: &Principal,
) -> Result<ModelTarget, RouterError> {
    let candidates = catalog.list_models(query);

    candidates
        .into_iter()
        .filter(|target| principal.authorize(&target.model.provider_name, &target.model.name).is_ok())
        .min_by(|a, b| {
            (&a.model.provider_name, &a.model.name).cmp(&(&b.model.provider_name, &b.model.name))
        })
        .ok_or(RouterError::NoCandidate)
}
