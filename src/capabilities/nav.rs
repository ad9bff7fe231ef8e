use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::event::{ListingId, ListingKind};

/// The routes this core navigates to. The shell owns actual routing; the
/// core only ever emits one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Home,
    SignIn,
    ListingDetail { kind: ListingKind, id: ListingId },
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::SignIn => "/sign-in".to_string(),
            Self::ListingDetail { kind, id } => format!("/category/{kind}/{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavOperation {
    pub path: String,
}

impl Operation for NavOperation {
    type Output = ();
}

#[derive(Clone)]
pub struct Navigator<E> {
    context: CapabilityContext<NavOperation, E>,
}

impl<Ev> Capability<Ev> for Navigator<Ev> {
    type Operation = NavOperation;
    type MappedSelf<MappedEv> = Navigator<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigator::new(self.context.map_event(f))
    }
}

impl<E> Navigator<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<NavOperation, E>) -> Self {
        Self { context }
    }

    /// Fire-and-forget route change; the shell does not answer.
    pub fn navigate(&self, route: &Route) {
        let context = self.context.clone();
        let operation = NavOperation { path: route.path() };
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}
