//! One visitor's checkout, from address entry to confirmation.

use std::sync::Arc;

use chrono::Utc;
use danithur_core::{
    CartSnapshot, CheckoutStep, OrderId, PaymentMethod, PaymentStatus, PostalCode, Price, UserId,
    VehicleId, VehicleSummary,
};
use tracing::{error, info, instrument};

use super::confirmation::ConfirmationSummary;
use super::form::{CheckoutForm, FormPatch, ValidatedForm};
use super::mask;
use super::payment::{AcceptedArtifact, PaymentFlow, PlacedOrder, boleto_due_date};
use super::pix::{PixCheck, PixMonitor};
use super::view::CheckoutView;
use super::{CartTotals, CheckoutError};
use crate::backend::{CardDetailsPayload, CreateOrderRequest, DealershipApi, DeliveryAddressPayload};
use crate::config::{CheckoutConfig, MerchantInfo};
use crate::postal::{PostalCodeLookup, ResolvedAddress};

/// Checkout state for a single visitor.
///
/// The cart and its total are frozen when the session starts. The step only
/// moves forward; going back means abandoning the session and starting over.
#[derive(Debug)]
pub struct CheckoutSession {
    buyer_id: UserId,
    vehicle_id: VehicleId,
    cart: CartSnapshot,
    total: Price,
    item_count: u32,
    step: CheckoutStep,
    form: CheckoutForm,
    address_notice: Option<String>,
    order: Option<PlacedOrder>,
    /// Order created by the backend without payment data.
    stranded_order: Option<OrderId>,
}

impl CheckoutSession {
    /// Begin checkout for a signed-in buyer.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotSignedIn`] without a buyer,
    /// [`CheckoutError::EmptyCart`] when there is nothing to buy and
    /// [`CheckoutError::Validation`] when the cart cannot be summed.
    pub fn start(
        buyer_id: Option<UserId>,
        cart: Option<CartSnapshot>,
    ) -> Result<Self, CheckoutError> {
        let buyer_id = buyer_id.ok_or(CheckoutError::NotSignedIn)?;
        let cart = cart.ok_or(CheckoutError::EmptyCart)?;
        let vehicle_id = cart
            .items
            .first()
            .map(|item| item.vehicle_id)
            .ok_or(CheckoutError::EmptyCart)?;
        let CartTotals { item_count, total } = CartTotals::of(&cart)?;

        Ok(Self {
            buyer_id,
            vehicle_id,
            cart,
            total,
            item_count,
            step: CheckoutStep::Address,
            form: CheckoutForm::new(),
            address_notice: None,
            order: None,
            stranded_order: None,
        })
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    #[must_use]
    pub const fn cart(&self) -> &CartSnapshot {
        &self.cart
    }

    #[must_use]
    pub const fn form(&self) -> &CheckoutForm {
        &self.form
    }

    #[must_use]
    pub fn address_notice(&self) -> Option<&str> {
        self.address_notice.as_deref()
    }

    #[must_use]
    pub const fn order(&self) -> Option<&PlacedOrder> {
        self.order.as_ref()
    }

    /// Units in the frozen cart.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.item_count
    }

    #[must_use]
    pub fn vehicle(&self) -> Option<VehicleSummary> {
        self.cart.vehicle()
    }

    /// Payment status of the placed order, `pending` before submission.
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        self.order
            .as_ref()
            .map_or(PaymentStatus::Pending, |order| order.flow.status())
    }

    /// Pull in anything the Pix monitor settled since the last call.
    ///
    /// A paid Pix order moves the session to confirmation; this happens once.
    pub fn refresh(&mut self) -> CheckoutStep {
        if self.step == CheckoutStep::Payment
            && self.order.as_ref().is_some_and(|order| {
                order.method() == PaymentMethod::Pix && order.flow.status() == PaymentStatus::Paid
            })
        {
            info!(buyer_id = %self.buyer_id, "Pix payment settled, moving to confirmation");
            self.step = CheckoutStep::Confirmation;
        }
        self.step
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), CheckoutError> {
        if self.step == CheckoutStep::Address && self.order.is_none() {
            Ok(())
        } else {
            Err(CheckoutError::InvalidStep {
                step: self.step,
                action,
            })
        }
    }

    /// Merge typed form values.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidStep`] once an order exists.
    pub fn update_form(&mut self, patch: FormPatch) -> Result<(), CheckoutError> {
        self.ensure_editable("edit form")?;
        self.form.apply(patch);
        Ok(())
    }

    /// Mask the postal code and, once it has 8 digits, resolve it.
    ///
    /// Returns `None` while the code is incomplete. A failed lookup leaves
    /// the address fields as they were and records a notice for the form.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::LookupNotFound`] or
    /// [`CheckoutError::Network`] when resolution fails; neither blocks
    /// submission.
    #[instrument(skip(self, lookup), fields(buyer_id = %self.buyer_id))]
    pub async fn resolve_postal_code(
        &mut self,
        raw: &str,
        lookup: &dyn PostalCodeLookup,
    ) -> Result<Option<ResolvedAddress>, CheckoutError> {
        self.ensure_editable("lookup postal code")?;
        self.form.postal_code = mask::mask_postal_code(raw);
        self.address_notice = None;

        let Ok(code) = PostalCode::parse(&self.form.postal_code) else {
            return Ok(None);
        };

        match lookup.lookup(&code).await {
            Ok(resolved) => {
                self.form.apply_lookup(&resolved);
                Ok(Some(resolved))
            }
            Err(e) => {
                let err = CheckoutError::from(e);
                self.address_notice = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Build the order creation body for a validated form.
    ///
    /// The total is the one frozen at checkout entry.
    #[must_use]
    pub fn order_request(&self, validated: &ValidatedForm) -> CreateOrderRequest {
        let card = validated.card.as_ref();

        CreateOrderRequest {
            buyer_id: self.buyer_id,
            vehicle_id: self.vehicle_id,
            cart_id: self.cart.cart_id,
            total_price: self.total.amount,
            payment_method: validated.payment_method.code(),
            observations: validated.observations.clone(),
            delivery_address: DeliveryAddressPayload::from(&validated.address),
            installments: card.map(|c| c.installments),
            card: card.map(|c| CardDetailsPayload {
                number: c.number.clone(),
                expiry: c.expiry.clone(),
                cvv: c.cvv.clone(),
                holder_name: c.holder_name.clone(),
            }),
        }
    }

    /// Validate the form, create the order and enter the payment step.
    ///
    /// Nothing is sent to the backend unless every field validates.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] with every field problem,
    /// [`CheckoutError::InvalidStep`] if an order already exists, or the
    /// backend failure. The session stays on the address step on error.
    /// An order created without payment data is remembered so a retry
    /// does not place a second one.
    #[instrument(skip(self, api, config), fields(buyer_id = %self.buyer_id))]
    pub async fn submit(
        &mut self,
        api: &Arc<dyn DealershipApi>,
        config: &CheckoutConfig,
    ) -> Result<(), CheckoutError> {
        self.ensure_editable("submit")?;
        if let Some(order_id) = self.stranded_order {
            return Err(CheckoutError::Server {
                status: 502,
                message: format!(
                    "Pedido {order_id} já foi criado sem dados de pagamento. \
                     Entre em contato com a loja."
                ),
            });
        }
        let validated = self.form.validate().map_err(CheckoutError::Validation)?;
        let request = self.order_request(&validated);

        let response = api.create_order(&request).await?;
        let artifact = match AcceptedArtifact::from_response(validated.payment_method, &response)
        {
            Ok(artifact) => artifact,
            Err(err) => {
                error!(
                    order_id = %response.order_id,
                    method = %validated.payment_method,
                    "Order created without payment data"
                );
                self.stranded_order = Some(response.order_id);
                return Err(err);
            }
        };
        let placed_at = Utc::now();

        let flow = match artifact {
            AcceptedArtifact::Pix(charge) => {
                let expires_in_seconds = charge
                    .expires_in_seconds
                    .unwrap_or(config.pix_default_expiry_secs);
                let monitor = PixMonitor::spawn(
                    Arc::clone(api),
                    charge.transaction_id.clone(),
                    expires_in_seconds,
                    config,
                );
                PaymentFlow::Pix {
                    charge,
                    expires_in_seconds,
                    monitor,
                }
            }
            AcceptedArtifact::Boleto(document) => PaymentFlow::Boleto {
                document,
                due_date: boleto_due_date(placed_at.date_naive(), config.boleto_due_days),
            },
            AcceptedArtifact::CreditCard => {
                let installments = validated
                    .card
                    .as_ref()
                    .map_or(mask::MIN_INSTALLMENTS, |c| c.installments);
                PaymentFlow::CreditCard {
                    installments,
                    installment_value: self.total.installment(installments),
                }
            }
        };

        info!(
            order_id = %response.order_id,
            method = %validated.payment_method,
            total = %self.total,
            "Order placed"
        );

        self.order = Some(PlacedOrder {
            order_id: response.order_id,
            total: self.total,
            address: validated.address,
            placed_at,
            flow,
        });
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// "I already paid" for Pix: check with the backend now.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentExpired`] once the charge expired,
    /// [`CheckoutError::InvalidStep`] for other methods, or the backend
    /// failure.
    pub async fn check_payment(&mut self) -> Result<PixCheck, CheckoutError> {
        self.refresh();
        let monitor = self
            .order
            .as_ref()
            .and_then(|order| order.flow.pix_monitor())
            .ok_or(CheckoutError::InvalidStep {
                step: self.step,
                action: "check Pix payment",
            })?;

        let result = monitor.check_now().await?;
        self.refresh();
        Ok(result)
    }

    /// "I already paid" for boleto, "continue" for card.
    ///
    /// Boleto is trusted without asking the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidStep`] outside the payment step or for
    /// Pix, which is only confirmed by a status check.
    pub fn confirm_payment(&mut self) -> Result<(), CheckoutError> {
        self.refresh();
        let method = self.order.as_ref().map(PlacedOrder::method);
        match (self.step, method) {
            (CheckoutStep::Payment, Some(PaymentMethod::Boleto | PaymentMethod::CreditCard)) => {
                self.step = CheckoutStep::Confirmation;
                Ok(())
            }
            (step, _) => Err(CheckoutError::InvalidStep {
                step,
                action: "confirm payment",
            }),
        }
    }

    /// Summary shown on the confirmation step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidStep`] before confirmation.
    pub fn confirmation(&self, merchant: &MerchantInfo) -> Result<ConfirmationSummary, CheckoutError> {
        match (&self.order, self.step) {
            (Some(order), CheckoutStep::Confirmation) => Ok(ConfirmationSummary::new(
                order,
                self.vehicle(),
                merchant,
            )),
            _ => Err(CheckoutError::InvalidStep {
                step: self.step,
                action: "view confirmation",
            }),
        }
    }

    /// Serializable view for the SPA.
    #[must_use]
    pub fn view(&self) -> CheckoutView {
        CheckoutView::from_session(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use danithur_core::{CartId, CartItem, OrderId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::backend::{
        BackendError, BoletoDocument, CreateOrderResponse, PixCharge, PixPaymentStatus, api_error,
    };
    use crate::postal::PostalLookupError;

    #[derive(Default)]
    struct FakeApi {
        requests: Mutex<Vec<CreateOrderRequest>>,
        reject_with: Option<(u16, String)>,
        expires_in_seconds: Option<u64>,
        paid: AtomicBool,
        status_checks: AtomicU32,
        /// Accept the order but leave out the payment data.
        omit_payment_data: bool,
    }

    impl FakeApi {
        fn requests(&self) -> Vec<CreateOrderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DealershipApi for FakeApi {
        async fn create_order(
            &self,
            request: &CreateOrderRequest,
        ) -> Result<CreateOrderResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some((status, body)) = &self.reject_with {
                return Err(api_error(*status, body));
            }
            let method = PaymentMethod::from_code(request.payment_method).unwrap();
            if self.omit_payment_data {
                return Ok(CreateOrderResponse {
                    order_id: OrderId::new(501),
                    pix: None,
                    boleto: None,
                });
            }
            Ok(CreateOrderResponse {
                order_id: OrderId::new(501),
                pix: (method == PaymentMethod::Pix).then(|| PixCharge {
                    qr_code_base64: Some("iVBORw0KGgo=".to_string()),
                    copy_paste: "00020126580014br.gov.bcb.pix".to_string(),
                    transaction_id: "tx-501".to_string(),
                    expires_in_seconds: self.expires_in_seconds,
                }),
                boleto: (method == PaymentMethod::Boleto).then(|| BoletoDocument {
                    document_url: "https://boletos.example/501.pdf".to_string(),
                }),
            })
        }

        async fn pix_payment_status(
            &self,
            _transaction_id: &str,
        ) -> Result<PixPaymentStatus, BackendError> {
            self.status_checks.fetch_add(1, Ordering::SeqCst);
            Ok(PixPaymentStatus {
                paid: self.paid.load(Ordering::SeqCst),
            })
        }
    }

    struct FakeLookup;

    #[async_trait]
    impl PostalCodeLookup for FakeLookup {
        async fn lookup(&self, code: &PostalCode) -> Result<ResolvedAddress, PostalLookupError> {
            match code.digits() {
                "01310930" => Ok(ResolvedAddress {
                    street: "Avenida Paulista".to_string(),
                    neighborhood: "Bela Vista".to_string(),
                    city: "São Paulo".to_string(),
                    region: "SP".to_string(),
                }),
                other => Err(PostalLookupError::NotFound(other.to_string())),
            }
        }
    }

    fn cart() -> CartSnapshot {
        CartSnapshot {
            cart_id: CartId::new(7),
            items: vec![CartItem {
                vehicle_id: VehicleId::new(42),
                name: "Jeep Compass Longitude".to_string(),
                unit_price: Price::new(Decimal::new(15_990_000, 2)),
                quantity: 1,
                color: Some("Prata".to_string()),
                image_url: None,
                model_year: Some(2022),
                plate: Some("ABC1D23".to_string()),
            }],
        }
    }

    fn session() -> CheckoutSession {
        CheckoutSession::start(Some(UserId::new(3)), Some(cart())).unwrap()
    }

    fn address_patch() -> FormPatch {
        FormPatch {
            postal_code: Some("01310930".to_string()),
            street: Some("Avenida Paulista".to_string()),
            number: Some("1578".to_string()),
            neighborhood: Some("Bela Vista".to_string()),
            city: Some("São Paulo".to_string()),
            region: Some("SP".to_string()),
            ..FormPatch::default()
        }
    }

    fn api(fake: FakeApi) -> (Arc<FakeApi>, Arc<dyn DealershipApi>) {
        let fake = Arc::new(fake);
        let api: Arc<dyn DealershipApi> = fake.clone();
        (fake, api)
    }

    #[test]
    fn test_start_requires_buyer_and_items() {
        assert!(matches!(
            CheckoutSession::start(None, Some(cart())),
            Err(CheckoutError::NotSignedIn)
        ));
        let empty = CartSnapshot {
            cart_id: CartId::new(1),
            items: vec![],
        };
        assert!(matches!(
            CheckoutSession::start(Some(UserId::new(1)), Some(empty)),
            Err(CheckoutError::EmptyCart)
        ));
        assert!(matches!(
            CheckoutSession::start(Some(UserId::new(1)), None),
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[test]
    fn test_start_rejects_cart_out_of_range() {
        let mut oversized = cart();
        oversized.items[0].unit_price =
            Price::new(Decimal::from_str_exact("50000000000000000000000000000").unwrap());
        oversized.items[0].quantity = 2;

        let Err(CheckoutError::Validation(fields)) =
            CheckoutSession::start(Some(UserId::new(1)), Some(oversized))
        else {
            panic!("expected a validation error");
        };
        assert!(fields.contains_key("cart"));
    }

    #[test]
    fn test_start_freezes_total_and_count() {
        let mut two = cart();
        two.items[0].quantity = 2;
        let session = CheckoutSession::start(Some(UserId::new(1)), Some(two)).unwrap();
        assert_eq!(session.item_count(), 2);
        assert_eq!(session.total(), Price::new(Decimal::new(31_980_000, 2)));
    }

    #[tokio::test]
    async fn test_postal_code_lookup_keeps_number_and_complement() {
        let mut session = session();
        session
            .update_form(FormPatch {
                number: Some("1578".to_string()),
                complement: Some("Conj. 4".to_string()),
                ..FormPatch::default()
            })
            .unwrap();

        let resolved = session
            .resolve_postal_code("01310930", &FakeLookup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.city, "São Paulo");

        let form = session.form();
        assert_eq!(form.postal_code, "01310-930");
        assert_eq!(form.street, "Avenida Paulista");
        assert_eq!(form.city, "São Paulo");
        assert_eq!(form.region, "SP");
        assert_eq!(form.number, "1578");
        assert_eq!(form.complement, "Conj. 4");
    }

    #[tokio::test]
    async fn test_incomplete_postal_code_does_not_lookup() {
        let mut session = session();
        let resolved = session.resolve_postal_code("0131", &FakeLookup).await.unwrap();
        assert!(resolved.is_none());
        assert_eq!(session.form().postal_code, "0131");
    }

    #[tokio::test]
    async fn test_unknown_postal_code_leaves_fields_and_sets_notice() {
        let mut session = session();
        session
            .update_form(FormPatch {
                street: Some("Rua Direita".to_string()),
                ..FormPatch::default()
            })
            .unwrap();

        let err = session
            .resolve_postal_code("99999-999", &FakeLookup)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::LookupNotFound(_)));
        assert_eq!(session.form().street, "Rua Direita");
        assert_eq!(session.address_notice(), Some("CEP não encontrado"));
        assert_eq!(session.step(), CheckoutStep::Address);
    }

    #[tokio::test]
    async fn test_payload_total_matches_cart_snapshot() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        let expected_total = session.cart().total().unwrap();
        session.update_form(address_patch()).unwrap();

        session.submit(&api, &CheckoutConfig::default()).await.unwrap();

        let requests = fake.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.total_price, expected_total.amount);
        assert_eq!(request.vehicle_id, VehicleId::new(42));
        assert_eq!(request.cart_id, CartId::new(7));
        assert_eq!(request.buyer_id, UserId::new(3));
        assert_eq!(request.payment_method, 0);
        assert!(request.card.is_none());
        assert_eq!(session.step(), CheckoutStep::Payment);
        assert_eq!(session.payment_status(), PaymentStatus::AwaitingPayment);
    }

    #[tokio::test]
    async fn test_card_missing_field_never_reaches_backend() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session
            .update_form(FormPatch {
                payment_method: Some(PaymentMethod::CreditCard),
                card_number: Some("4111111111111111".to_string()),
                card_expiry: Some("12/25".to_string()),
                card_holder_name: Some("ANA SOUZA".to_string()),
                ..FormPatch::default()
            })
            .unwrap();

        let err = session
            .submit(&api, &CheckoutConfig::default())
            .await
            .unwrap_err();
        match err {
            CheckoutError::Validation(fields) => assert!(fields.contains_key("cardCvv")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fake.requests().is_empty());
        assert_eq!(session.step(), CheckoutStep::Address);
    }

    #[tokio::test]
    async fn test_card_flow_to_confirmation() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session
            .update_form(FormPatch {
                payment_method: Some(PaymentMethod::CreditCard),
                card_number: Some("4111 1111 1111 1111".to_string()),
                card_expiry: Some("1225".to_string()),
                card_cvv: Some("123".to_string()),
                card_holder_name: Some("ANA SOUZA".to_string()),
                installments: Some(15),
                ..FormPatch::default()
            })
            .unwrap();

        session.submit(&api, &CheckoutConfig::default()).await.unwrap();
        let request = &fake.requests()[0];
        assert_eq!(request.payment_method, 2);
        assert_eq!(request.installments, Some(12));
        assert_eq!(request.card.as_ref().unwrap().number, "4111111111111111");
        assert_eq!(session.payment_status(), PaymentStatus::Paid);
        assert_eq!(session.step(), CheckoutStep::Payment);

        session.confirm_payment().unwrap();
        assert_eq!(session.step(), CheckoutStep::Confirmation);

        let summary = session.confirmation(&MerchantInfo::default()).unwrap();
        let breakdown = summary.installments.unwrap();
        assert_eq!(breakdown.count, 12);
        assert_eq!(breakdown.value.amount, Decimal::new(1_332_500, 2));
    }

    #[tokio::test]
    async fn test_boleto_trusts_buyer() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session
            .update_form(FormPatch {
                payment_method: Some(PaymentMethod::Boleto),
                ..FormPatch::default()
            })
            .unwrap();

        session.submit(&api, &CheckoutConfig::default()).await.unwrap();
        let order = session.order().unwrap();
        match &order.flow {
            PaymentFlow::Boleto { document, due_date } => {
                assert_eq!(document.document_url, "https://boletos.example/501.pdf");
                assert_eq!(
                    (*due_date - order.placed_at.date_naive()).num_days(),
                    3
                );
            }
            other => panic!("unexpected flow: {other:?}"),
        }

        session.confirm_payment().unwrap();
        assert_eq!(session.step(), CheckoutStep::Confirmation);
        assert_eq!(fake.status_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_rejection_stays_on_address_step() {
        let (_, api) = api(FakeApi {
            reject_with: Some((
                400,
                r#"{"errors": {"Numero": ["Número é obrigatório"]}}"#.to_string(),
            )),
            ..FakeApi::default()
        });
        let mut session = session();
        session.update_form(address_patch()).unwrap();

        let err = session
            .submit(&api, &CheckoutConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Número é obrigatório");
        assert_eq!(session.step(), CheckoutStep::Address);
        assert!(session.order().is_none());

        // Still editable after a failure
        session
            .update_form(FormPatch {
                number: Some("1579".to_string()),
                ..FormPatch::default()
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_order_without_payment_data_is_not_placed_twice() {
        let (fake, api) = api(FakeApi {
            omit_payment_data: true,
            ..FakeApi::default()
        });
        let mut session = session();
        session.update_form(address_patch()).unwrap();

        let err = session
            .submit(&api, &CheckoutConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Server { status: 502, .. }));
        assert!(err.user_message().contains("501"));
        assert_eq!(session.step(), CheckoutStep::Address);

        let err = session
            .submit(&api, &CheckoutConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Server { status: 502, .. }));
        assert!(err.user_message().contains("501"));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session.submit(&api, &CheckoutConfig::default()).await.unwrap();

        let err = session
            .submit(&api, &CheckoutConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidStep { .. }));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pix_manual_confirmation_moves_to_confirmation_once() {
        let (fake, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session.submit(&api, &CheckoutConfig::default()).await.unwrap();

        assert_eq!(session.check_payment().await.unwrap(), PixCheck::NotYetConfirmed);
        assert_eq!(session.step(), CheckoutStep::Payment);

        fake.paid.store(true, Ordering::SeqCst);
        assert_eq!(session.check_payment().await.unwrap(), PixCheck::Paid);
        assert_eq!(session.step(), CheckoutStep::Confirmation);
        let checks_at_confirmation = fake.status_checks.load(Ordering::SeqCst);

        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(session.refresh(), CheckoutStep::Confirmation);
        assert_eq!(fake.status_checks.load(Ordering::SeqCst), checks_at_confirmation);
        assert!(session.confirm_payment().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pix_expiry_is_fatal() {
        let (_, api) = api(FakeApi {
            expires_in_seconds: Some(5),
            ..FakeApi::default()
        });
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session.submit(&api, &CheckoutConfig::default()).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;
        assert_eq!(session.payment_status(), PaymentStatus::Expired);
        assert!(matches!(
            session.check_payment().await,
            Err(CheckoutError::PaymentExpired)
        ));
        assert_eq!(session.refresh(), CheckoutStep::Payment);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pix_default_expiry_when_backend_omits_it() {
        let (_, api) = api(FakeApi::default());
        let mut session = session();
        session.update_form(address_patch()).unwrap();
        session.submit(&api, &CheckoutConfig::default()).await.unwrap();

        let monitor = session.order().unwrap().flow.pix_monitor().unwrap();
        assert_eq!(monitor.state().seconds_left, 1800);
    }
}
