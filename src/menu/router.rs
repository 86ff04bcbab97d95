use anyhow::Result;

pub struct EventRoute {
    pub pattern: EventPattern,
    pub handler: EventHandler,
}

pub enum EventPattern {
    Exact(String),
    Prefix(String),
}

impl EventPattern {
    pub fn matches(&self, event_id: &str) -> bool {
        match self {
            EventPattern::Exact(s) => s == event_id,
            EventPattern::Prefix(p) => event_id.starts_with(p),
        }
    }
}

pub type EventHandler = Box<dyn Fn(&str) -> Result<HandlerResult> + Send + Sync>;

pub enum HandlerResult {
    Continue,
    Quit,
}

/// Dispatches menu event ids to the first matching route. Unroutable events
/// are logged and ignored.
pub struct EventRouter {
    routes: Vec<EventRoute>,
}

impl EventRouter {
    pub fn new(routes: Vec<EventRoute>) -> Self {
        Self { routes }
    }

    pub fn route(&self, event_id: &str) -> Result<HandlerResult> {
        for route in &self.routes {
            if route.pattern.matches(event_id) {
                return (route.handler)(event_id);
            }
        }

        log::warn!("No route found for event: {}", event_id);
        Ok(HandlerResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_route(pattern: EventPattern, hits: Arc<AtomicUsize>) -> EventRoute {
        EventRoute {
            pattern,
            handler: Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerResult::Continue)
            }),
        }
    }

    #[test]
    fn exact_pattern_matches_only_itself() {
        let pattern = EventPattern::Exact("__quit__".to_string());

        assert!(pattern.matches("__quit__"));
        assert!(!pattern.matches("__quit__extra"));
        assert!(!pattern.matches("quit"));
    }

    #[test]
    fn prefix_pattern_matches_namespaced_events() {
        let pattern = EventPattern::Prefix("anim::".to_string());

        assert!(pattern.matches("anim::flame"));
        assert!(pattern.matches("anim::"));
        assert!(!pattern.matches("speed::cpu"));
    }

    #[test]
    fn router_dispatches_to_first_match() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let router = EventRouter::new(vec![
            counting_route(EventPattern::Prefix("anim::".to_string()), first.clone()),
            counting_route(EventPattern::Prefix("anim::fl".to_string()), second.clone()),
        ]);

        router.route("anim::flame").unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unrouted_events_continue() {
        let router = EventRouter::new(vec![]);

        let result = router.route("nothing::here").unwrap();

        assert!(matches!(result, HandlerResult::Continue));
    }

    #[test]
    fn handler_receives_full_event_id() {
        let router = EventRouter::new(vec![EventRoute {
            pattern: EventPattern::Prefix("anim::".to_string()),
            handler: Box::new(|event_id| {
                assert_eq!(event_id, "anim::flame");
                Ok(HandlerResult::Continue)
            }),
        }]);

        router.route("anim::flame").unwrap();
    }
}
