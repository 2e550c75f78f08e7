//! Step-plan resolver backed by the definitions HTTP service.

use crate::chain::ChainClient;
use crate::config::MigratorConfig;
use crate::errors::{FetchError, Result};
use crate::FetchResult;
use crate::plan::dispatcher::encode_operation;
use crate::plan::schema::{BindingContext, DefinitionDocument, StepDefinition, PLAN_SCHEMA_VERSION};
use crate::plan::{ExecutableStep, StepPlan, StepPlanResolver};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fetches plans from `GET {base}/api/definitions/asset/{asset_id}`.
pub struct HttpPlanResolver {
    http_client: HttpClient,
    base_url: Url,
    chain: Arc<dyn ChainClient>,
}

impl HttpPlanResolver {
    pub fn new(http_client: HttpClient, base_url: Url, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            http_client,
            base_url,
            chain,
        }
    }

    /// Create a resolver from configuration; resolved steps submit through `chain`.
    pub fn from_config(config: &MigratorConfig, chain: Arc<dyn ChainClient>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()?;

        Ok(Self::new(http_client, config.api_base_url.clone(), chain))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the definitions document for one asset, protocol and chain.
    pub fn definitions_url(
        &self,
        asset_id: &str,
        protocol: &str,
        chain_id: u64,
    ) -> FetchResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| FetchError::InvalidUrl {
                reason: format!("{} cannot be used as a base URL", self.base_url),
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "definitions", "asset", asset_id]);
        }
        url.query_pairs_mut()
            .append_pair("protocol", protocol)
            .append_pair("chainId", &chain_id.to_string());
        Ok(url)
    }

    async fn fetch_document(
        &self,
        url: &Url,
        asset_id: &str,
    ) -> FetchResult<DefinitionDocument> {
        let request_failed = |e: reqwest::Error| FetchError::RequestFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .http_client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                asset_id: asset_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(request_failed)?;
        serde_json::from_str(&body).map_err(|e| FetchError::DecodeFailed {
            asset_id: asset_id.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Reject documents that describe a different asset, chain or protocol
/// than the one requested, or that use an unknown schema version.
fn check_document(
    document: &DefinitionDocument,
    asset_id: &str,
    contract_address: Address,
    chain_id: u64,
    protocol: &str,
) -> FetchResult<()> {
    if document.version != PLAN_SCHEMA_VERSION {
        return Err(FetchError::UnsupportedVersion {
            version: document.version,
            expected: PLAN_SCHEMA_VERSION,
        });
    }

    let mismatch = |field, expected: String, actual: String| FetchError::PlanMismatch {
        asset_id: asset_id.to_string(),
        field,
        expected,
        actual,
    };

    if document.chain_id != chain_id {
        return Err(mismatch("chainId", chain_id.to_string(), document.chain_id.to_string()));
    }
    if document.contract_address != contract_address {
        return Err(mismatch(
            "contractAddress",
            contract_address.to_string(),
            document.contract_address.to_string(),
        ));
    }
    if let Some(returned) = &document.protocol {
        if !returned.eq_ignore_ascii_case(protocol) {
            return Err(mismatch("protocol", protocol.to_string(), returned.clone()));
        }
    }

    // Encode every operation once with placeholder values so that bindings a
    // step cannot satisfy fail here rather than mid-pipeline.
    let placeholder = BindingContext {
        amount: U256::ZERO,
        user: Address::ZERO,
        spender: document.spender,
        contract: document.contract_address,
        chain_id,
    };
    for step in document.withdraw.iter().chain(&document.deposit) {
        encode_operation(&step.operation, &placeholder).map_err(|e| FetchError::DecodeFailed {
            asset_id: asset_id.to_string(),
            reason: format!("step '{}': {}", step.title, e),
        })?;
    }

    Ok(())
}

#[async_trait]
impl StepPlanResolver for HttpPlanResolver {
    async fn fetch_plan(
        &self,
        asset_id: &str,
        contract_address: Address,
        chain_id: u64,
        protocol: &str,
    ) -> FetchResult<StepPlan> {
        let url = self.definitions_url(asset_id, protocol, chain_id)?;
        tracing::debug!(url = %url, asset_id = asset_id, protocol = protocol, "Fetching step plan");

        let document = self.fetch_document(&url, asset_id).await.inspect_err(|e| {
            tracing::warn!(asset_id = asset_id, protocol = protocol, error = %e, "Step plan fetch failed");
        })?;
        check_document(&document, asset_id, contract_address, chain_id, protocol).inspect_err(|e| {
            tracing::warn!(asset_id = asset_id, protocol = protocol, error = %e, "Step plan rejected");
        })?;

        let DefinitionDocument {
            contract_address,
            spender,
            withdraw,
            deposit,
            ..
        } = document;
        let bind = |steps: Vec<StepDefinition>| -> Vec<ExecutableStep> {
            steps
                .into_iter()
                .map(|step| ExecutableStep::new(step, contract_address, spender, chain_id, self.chain.clone()))
                .collect()
        };
        let plan = StepPlan {
            withdraw: bind(withdraw),
            deposit: bind(deposit),
        };

        tracing::info!(
            asset_id = asset_id,
            protocol = protocol,
            withdraw_steps = plan.withdraw.len(),
            deposit_steps = plan.deposit.len(),
            "Step plan resolved"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::testing::FakeChain;
    use crate::plan::schema::Operation;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::str::FromStr;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const POOL: &str = "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2";

    fn usdc() -> Address {
        Address::from_str(USDC).unwrap()
    }

    fn resolver(server: &Server) -> HttpPlanResolver {
        HttpPlanResolver::new(
            HttpClient::new(),
            Url::parse(&server.url()).unwrap(),
            FakeChain::confirming_after(1),
        )
    }

    fn document() -> serde_json::Value {
        json!({
            "version": 1,
            "contractAddress": USDC,
            "chainId": 1,
            "protocol": "Aave",
            "spender": POOL,
            "withdraw": [{
                "title": "Withdraw USDC from Aave",
                "operation": { "kind": "withdraw", "venue": "aave_v3", "pool": "address:spender",
                               "asset": "address:contract", "amount": "amount:max" }
            }],
            "deposit": [
                { "title": "Approve USDC",
                  "operation": { "kind": "approve", "token": "address:contract",
                                 "spender": "address:spender", "amount": "amount" } },
                { "title": "Supply USDC",
                  "operation": { "kind": "supply", "venue": "aave_v3", "pool": "address:spender",
                                 "asset": "address:contract", "amount": "amount" } }
            ]
        })
    }

    async fn serve(server: &mut Server, body: String) -> mockito::Mock {
        server
            .mock("GET", "/api/definitions/asset/usdc")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("protocol".into(), "Aave".into()),
                Matcher::UrlEncoded("chainId".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fetch_plan() {
        let mut server = Server::new_async().await;
        let mock = serve(&mut server, document().to_string()).await;

        let plan = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await.unwrap();

        mock.assert_async().await;
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.withdraw.len(), 1);
        assert_eq!(plan.deposit.len(), 2);
        assert_eq!(plan.deposit[0].title, "Approve USDC");
        assert_eq!(plan.deposit[1].spender, Some(Address::from_str(POOL).unwrap()));
        assert!(matches!(plan.withdraw[0].operation, Operation::Withdraw { .. }));
    }

    #[tokio::test]
    async fn test_empty_legs_are_valid() {
        let mut server = Server::new_async().await;
        let mut body = document();
        body["withdraw"] = json!([]);
        body["deposit"] = json!([]);
        serve(&mut server, body.to_string()).await;

        let plan = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await.unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/definitions/asset/usdc")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        assert!(matches!(result, Err(FetchError::UnexpectedStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let mut server = Server::new_async().await;
        serve(&mut server, "const steps = [withdraw()]".to_string()).await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        assert!(matches!(result, Err(FetchError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_binding_is_a_decode_failure() {
        let mut server = Server::new_async().await;
        let mut body = document();
        body["deposit"][0]["operation"]["spender"] = json!("address:attacker");
        serve(&mut server, body.to_string()).await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        match result {
            Err(FetchError::DecodeFailed { reason, .. }) => assert!(reason.contains("address:attacker")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_spender_is_rejected_before_execution() {
        let mut server = Server::new_async().await;
        let mut body = document();
        body.as_object_mut().unwrap().remove("spender");
        serve(&mut server, body.to_string()).await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        assert!(matches!(result, Err(FetchError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_version() {
        let mut server = Server::new_async().await;
        let mut body = document();
        body["version"] = json!(2);
        serve(&mut server, body.to_string()).await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        assert!(matches!(
            result,
            Err(FetchError::UnsupportedVersion { version: 2, expected: 1 })
        ));
    }

    #[tokio::test]
    async fn test_mismatched_document_is_rejected() {
        let mut server = Server::new_async().await;
        let mut body = document();
        body["chainId"] = json!(10);
        serve(&mut server, body.to_string()).await;
        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Aave").await;
        assert!(matches!(result, Err(FetchError::PlanMismatch { field: "chainId", .. })));

        let mut server = Server::new_async().await;
        serve(&mut server, document().to_string()).await;
        let result = resolver(&server)
            .fetch_plan("usdc", Address::repeat_byte(1), 1, "Aave")
            .await;
        assert!(matches!(result, Err(FetchError::PlanMismatch { field: "contractAddress", .. })));
    }

    #[tokio::test]
    async fn test_protocol_mismatch() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/definitions/asset/usdc")
            .match_query(Matcher::UrlEncoded("protocol".into(), "Compound".into()))
            .with_status(200)
            .with_body(document().to_string())
            .create_async()
            .await;

        let result = resolver(&server).fetch_plan("usdc", usdc(), 1, "Compound").await;
        assert!(matches!(result, Err(FetchError::PlanMismatch { field: "protocol", .. })));
    }

    #[test]
    fn test_definitions_url_encodes_asset_id() {
        let resolver = HttpPlanResolver::new(
            HttpClient::new(),
            Url::parse("https://yields.example.com/v2/").unwrap(),
            FakeChain::confirming_after(1),
        );

        let url = resolver.definitions_url("usdc/../admin", "Aave", 8453).unwrap();
        assert_eq!(
            url.as_str(),
            "https://yields.example.com/v2/api/definitions/asset/usdc%2F..%2Fadmin?protocol=Aave&chainId=8453"
        );
    }
}
