/*
 * Responsibility
 * - Router-level layers: authentication filter, CORS, security headers, HTTP plumbing
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
