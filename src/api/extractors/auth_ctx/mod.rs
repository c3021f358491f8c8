/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the per-request context (RequestContext) to handlers
 * - axum-specific glue lives in core, plain types in types
 *
 * Public API:
 * - RequestContext, AuthOutcome
 * - CurrentPrincipal
 */

mod core;
mod types;

pub use self::core::CurrentPrincipal;
pub use self::types::{AuthOutcome, RequestContext};
