// ── Route → resource table ──

use crate::model::Resource;

/// Which collections a page needs, keyed by path prefix.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(String, Vec<Resource>)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        use Resource::{Articles, Categories, Clients, Technicians, Tickets};
        Self::new([
            ("/dashboard", vec![Clients, Tickets]),
            ("/clients", vec![Clients]),
            ("/tickets", vec![Tickets, Clients, Technicians]),
            ("/technicians", vec![Technicians, Tickets]),
            ("/knowledge-base", vec![Articles, Categories]),
            ("/reports", vec![Tickets, Clients, Technicians]),
        ])
    }
}

impl RouteTable {
    pub fn new<I, P>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<Resource>)>,
        P: Into<String>,
    {
        Self {
            routes: routes
                .into_iter()
                .map(|(path, resources)| (path.into(), resources))
                .collect(),
        }
    }

    /// Resources for the longest route that is a segment prefix of `path`.
    /// Query strings and fragments are ignored.
    pub fn resources_for(&self, path: &str) -> &[Resource] {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        self.routes
            .iter()
            .filter(|(route, _)| {
                path == route.as_str()
                    || path
                        .strip_prefix(route.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(route, _)| route.len())
            .map(|(_, resources)| resources.as_slice())
            .unwrap_or_default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(path, _)| path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_routes_map_to_their_resources() {
        let table = RouteTable::default();
        assert_eq!(
            table.resources_for("/dashboard"),
            &[Resource::Clients, Resource::Tickets]
        );
        assert_eq!(
            table.resources_for("/knowledge-base"),
            &[Resource::Articles, Resource::Categories]
        );
    }

    #[test]
    fn nested_paths_use_their_section() {
        let table = RouteTable::default();
        assert_eq!(
            table.resources_for("/tickets/t-1?tab=history"),
            &[Resource::Tickets, Resource::Clients, Resource::Technicians]
        );
        assert_eq!(table.resources_for("/clients/"), &[Resource::Clients]);
    }

    #[test]
    fn unknown_and_lookalike_paths_need_nothing() {
        let table = RouteTable::default();
        assert!(table.resources_for("/settings").is_empty());
        assert!(table.resources_for("/clientsarchive").is_empty());
        assert!(table.resources_for("/").is_empty());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::new([
            ("/tickets", vec![Resource::Tickets]),
            ("/tickets/board", vec![Resource::Technicians]),
        ]);
        assert_eq!(
            table.resources_for("/tickets/board/1"),
            &[Resource::Technicians]
        );
    }
}
