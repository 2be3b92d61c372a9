mod address_provider;
pub(crate) use address_provider::AddressProvider;

mod relation_provider;
pub(crate) use relation_provider::RelationProvider;

mod chain_state_provider;
pub(crate) use chain_state_provider::ChainStateProvider;

mod scan_state_provider;
pub(crate) use scan_state_provider::ScanStateProvider;

mod code_provider;
pub(crate) use code_provider::CodeProvider;

mod name_provider;
pub(crate) use name_provider::NameProvider;
