use alloy::primitives::U256;
use x402::{
    encode_payment, ExactSchemeClient, FirstAffordable, PaymentRequiredBody, PaymentRequirements,
    PaymentResponse, PaymentSelector, SchemeClient, WalletSigner, X402Error, DEFAULT_MAX_VALUE,
    PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, SCHEME_EXACT, X402_VERSION,
};

use crate::transport::{HttpTransport, InboundResponse, OutboundRequest, ReqwestTransport};

const PAYMENT_REQUIRED: u16 = 402;

/// Progress of one [`X402Client::fetch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Initial,
    Challenged,
    Authorizing,
    Retrying,
    Done,
    Failed,
}

/// Final response of a fetch, plus the server's payment confirmation when
/// a payment was made and the server sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidResponse {
    pub response: InboundResponse,
    pub payment: Option<PaymentResponse>,
}

impl PaidResponse {
    pub fn paid(&self) -> bool {
        self.payment.is_some()
    }
}

/// HTTP client that pays 402 challenges.
///
/// At most one payment per call: a 402 on the paid retry is an error, not a
/// new challenge. Ordinary failures (4xx/5xx other than 402) are returned
/// untouched.
pub struct X402Client<T = ReqwestTransport, S = FirstAffordable> {
    transport: T,
    selector: S,
    max_value: U256,
}

impl X402Client<ReqwestTransport, FirstAffordable> {
    pub fn new() -> Result<Self, X402Error> {
        Ok(Self::with_transport(ReqwestTransport::new()?))
    }
}

impl<T: HttpTransport> X402Client<T, FirstAffordable> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            selector: FirstAffordable,
            max_value: U256::from(DEFAULT_MAX_VALUE),
        }
    }
}

impl<T, S> X402Client<T, S> {
    /// Spending ceiling in atomic units for a single payment.
    pub fn with_max_value(mut self, max_value: U256) -> Self {
        self.max_value = max_value;
        self
    }

    pub fn with_selector<S2: PaymentSelector>(self, selector: S2) -> X402Client<T, S2> {
        X402Client {
            transport: self.transport,
            selector,
            max_value: self.max_value,
        }
    }

    pub fn max_value(&self) -> U256 {
        self.max_value
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: HttpTransport, S: PaymentSelector> X402Client<T, S> {
    /// Send `request`; on a 402, pay with `wallet` and send it once more.
    pub async fn fetch<W: WalletSigner>(
        &self,
        wallet: &W,
        request: &OutboundRequest,
    ) -> Result<PaidResponse, X402Error> {
        trace(FetchState::Initial, &request.url);
        let first = self.transport.send(request).await.inspect_err(failed)?;
        if first.status != PAYMENT_REQUIRED {
            trace(FetchState::Done, &request.url);
            return Ok(PaidResponse {
                response: first,
                payment: None,
            });
        }

        trace(FetchState::Challenged, &request.url);
        let challenge = parse_challenge(&first).inspect_err(failed)?;

        trace(FetchState::Authorizing, &request.url);
        let selected = self.select(&challenge.accepts).inspect_err(failed)?;
        let payload = ExactSchemeClient::new(wallet)
            .create_payment_payload(challenge.x402_version, &selected)
            .await
            .inspect_err(failed)?;
        let header = encode_payment(&payload).inspect_err(failed)?;

        trace(FetchState::Retrying, &request.url);
        let paid_request = request.clone().with_header(PAYMENT_HEADER, header);
        let retry = self.transport.send(&paid_request).await.inspect_err(failed)?;
        if retry.status == PAYMENT_REQUIRED {
            let reason = retry
                .json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "payment not accepted".to_string());
            let err = X402Error::PaymentRejected(reason);
            failed(&err);
            return Err(err);
        }

        let payment = retry
            .header(PAYMENT_RESPONSE_HEADER)
            .and_then(|raw| match PaymentResponse::decode(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring undecodable payment confirmation");
                    None
                }
            });
        trace(FetchState::Done, &request.url);
        tracing::info!(
            url = %request.url,
            status = retry.status,
            amount = %selected.max_amount_required,
            pay_to = %selected.pay_to,
            "paid request completed"
        );
        Ok(PaidResponse {
            response: retry,
            payment,
        })
    }

    pub async fn get<W: WalletSigner>(&self, wallet: &W, url: &str) -> Result<PaidResponse, X402Error> {
        self.fetch(wallet, &OutboundRequest::get(url)).await
    }

    pub async fn post_json<W: WalletSigner>(
        &self,
        wallet: &W,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<PaidResponse, X402Error> {
        self.fetch(wallet, &OutboundRequest::post_json(url, body)?).await
    }

    fn select(&self, accepts: &[PaymentRequirements]) -> Result<PaymentRequirements, X402Error> {
        let supported: Vec<PaymentRequirements> = accepts
            .iter()
            .filter(|r| r.scheme == SCHEME_EXACT)
            .cloned()
            .collect();
        if supported.is_empty() {
            let offered: Vec<&str> = accepts.iter().map(|r| r.scheme.as_str()).collect();
            return Err(X402Error::UnsupportedScheme(format!(
                "no supported scheme in {offered:?}"
            )));
        }

        self.selector
            .select(&supported, self.max_value)
            .cloned()
            .ok_or_else(|| X402Error::OverBudget {
                required: cheapest(&supported),
                ceiling: self.max_value.to_string(),
            })
    }
}

fn cheapest(candidates: &[PaymentRequirements]) -> String {
    candidates
        .iter()
        .filter_map(|c| c.max_amount().ok())
        .min()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse and validate a 402 body. Every offered descriptor must be well formed.
pub fn parse_challenge(response: &InboundResponse) -> Result<PaymentRequiredBody, X402Error> {
    let value: serde_json::Value = serde_json::from_slice(&response.body)
        .map_err(|e| X402Error::MalformedChallenge(format!("402 body is not JSON: {e}")))?;

    let version = match value.get("x402Version") {
        None => X402_VERSION,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| X402Error::MalformedChallenge(format!("bad x402Version: {v}")))?,
    };
    if version != X402_VERSION {
        return Err(X402Error::MalformedChallenge(format!(
            "unsupported x402Version {version}"
        )));
    }

    let accepts = value
        .get("accepts")
        .and_then(|a| a.as_array())
        .ok_or_else(|| X402Error::MalformedChallenge("`accepts` missing or not a list".to_string()))?;
    if accepts.is_empty() {
        return Err(X402Error::MalformedChallenge("`accepts` is empty".to_string()));
    }

    let accepts = accepts
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let req: PaymentRequirements = serde_json::from_value(raw.clone())
                .map_err(|e| X402Error::MalformedChallenge(format!("accepts[{i}]: {e}")))?;
            req.validate()
                .map_err(|e| X402Error::MalformedChallenge(format!("accepts[{i}]: {e}")))?;
            Ok(req)
        })
        .collect::<Result<Vec<_>, X402Error>>()?;

    let error = value
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(PaymentRequiredBody {
        x402_version: version,
        accepts,
        error,
    })
}

fn trace(state: FetchState, url: &str) {
    tracing::debug!(state = ?state, url = %url, "x402 fetch");
}

fn failed(err: &X402Error) {
    tracing::warn!(state = ?FetchState::Failed, code = err.code(), error = %err, "x402 fetch failed");
}
