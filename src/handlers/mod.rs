//! Tool endpoints.
//!
//! Every handler takes the `Exchange` by value and returns the complete
//! response. Handlers that call out on behalf of the caller check the
//! target host against the address policy before doing so.

pub mod codec;
pub mod csp;
pub mod health;
pub mod oauth2_client;
pub mod oauth2_provider;

use crate::http::{handler, Handler};
use crate::routing::{RouteError, RouteTable};

/// Register every endpoint, in match order.
pub fn register_all(routes: &mut RouteTable<Handler>) -> Result<(), RouteError> {
    routes
        .register("/api/health", handler(health::health))?
        .register("/api/csp", handler(csp::csp))?
        .register("/api/oauth2-client/start", handler(oauth2_client::start))?
        .register("/api/oauth2-client/verify", handler(oauth2_client::verify))?
        .register("/api/oauth2-provider/authorize", handler(oauth2_provider::authorize))?
        .register(
            "/api/oauth2-provider/authorize/(?P<decision>allow|deny)",
            handler(oauth2_provider::decide),
        )?;
    Ok(())
}

/// A route table holding every endpoint.
pub fn routes() -> Result<RouteTable<Handler>, RouteError> {
    let mut routes = RouteTable::new();
    register_all(&mut routes)?;
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_endpoint_registers() {
        let routes = routes().unwrap();
        assert_eq!(routes.len(), 6);
    }

    #[test]
    fn test_decision_route_captures_decision() {
        let routes = routes().unwrap();

        let matched = routes
            .match_path("/api/oauth2-provider/authorize/allow")
            .unwrap();
        assert_eq!(matched.fields["decision"], "allow");

        assert!(routes.match_path("/api/oauth2-provider/authorize/maybe").is_none());
        assert!(routes.match_path("/api/csp/extra").is_none());
    }
}
