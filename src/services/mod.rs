/*
 * Responsibility
 * - Domain services independent of HTTP routing (token lifecycle, path policy, collaborators)
 */
pub mod auth;
