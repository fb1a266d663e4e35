use rne_core_types::{ChangeSource, Classification, HostTree, IdentityId};

use crate::model::{EngineCounts, EngineState};
use crate::state::RegistryImpl;

/// The surface a driver needs to steer an engine without knowing its host type.
pub trait RedactionControl: Send {
    fn state(&self) -> EngineState;
    fn counts(&self) -> EngineCounts;
    fn root_count(&self) -> usize;
    fn is_monitoring(&self) -> bool;
    fn is_suppress_all(&self) -> bool;
    fn set_monitoring(&mut self, on: bool);
    fn set_suppress_all(&mut self, on: bool);
    fn set_identity_classification(&mut self, identity: &IdentityId, value: Classification)
        -> bool;
    fn reset_classifications(&mut self) -> Vec<IdentityId>;
    fn reset_page(&mut self) -> bool;
    fn pump_changes(&mut self) -> usize;
    fn panic(&mut self);
}

impl<H> RedactionControl for RegistryImpl<H>
where
    H: HostTree + ChangeSource,
{
    fn state(&self) -> EngineState {
        RegistryImpl::state(self)
    }

    fn counts(&self) -> EngineCounts {
        RegistryImpl::counts(self)
    }

    fn root_count(&self) -> usize {
        RegistryImpl::root_count(self)
    }

    fn is_monitoring(&self) -> bool {
        RegistryImpl::is_monitoring(self)
    }

    fn is_suppress_all(&self) -> bool {
        RegistryImpl::is_suppress_all(self)
    }

    fn set_monitoring(&mut self, on: bool) {
        RegistryImpl::set_monitoring(self, on)
    }

    fn set_suppress_all(&mut self, on: bool) {
        RegistryImpl::set_suppress_all(self, on)
    }

    fn set_identity_classification(
        &mut self,
        identity: &IdentityId,
        value: Classification,
    ) -> bool {
        RegistryImpl::set_identity_classification(self, identity, value)
    }

    fn reset_classifications(&mut self) -> Vec<IdentityId> {
        RegistryImpl::reset_classifications(self)
    }

    fn reset_page(&mut self) -> bool {
        RegistryImpl::reset_page(self)
    }

    fn pump_changes(&mut self) -> usize {
        RegistryImpl::pump_changes(self)
    }

    fn panic(&mut self) {
        RegistryImpl::panic(self)
    }
}
