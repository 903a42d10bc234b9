use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, RootProvider,
};

use x402::{RpcChain, UptoFacilitator};

use crate::audit::AuditStore;

/// Concrete provider type from `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Shared application state for the facilitator server.
pub struct AppState {
    pub facilitator: UptoFacilitator<RpcChain<WalletProvider>>,
    pub audit: AuditStore,
    /// CAIP-2 network this facilitator settles on.
    pub network: String,
    /// Address of the settlement wallet, reported by `/supported`.
    pub facilitator_address: Address,
}
