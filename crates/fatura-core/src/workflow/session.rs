//! The operator session: owns the invoices and drives every operation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::status::{Action, InvoiceStatus};
use super::store::InvoiceStore;
use crate::acquisition::TextAcquirer;
use crate::error::{FaturaError, Result};
use crate::extraction::StructuredExtractor;
use crate::models::config::FaturaConfig;
use crate::models::{Invoice, TextSource};
use crate::notice::Notice;
use crate::notify::{Channel, Delivery, Dispatcher, templates};

/// Outcome of `Session::ingest`.
#[derive(Debug)]
pub struct IngestReport {
    pub invoice_id: u64,
    pub source: TextSource,
    /// Compliance channel delivery.
    pub delivery: Delivery,
    pub notices: Vec<Notice>,
}

/// Outcome of a successful lifecycle action.
#[derive(Debug)]
pub struct TransitionReport {
    pub invoice_id: u64,
    pub from: InvoiceStatus,
    pub to: InvoiceStatus,
    /// Payment channel delivery, when the action sends one.
    pub delivery: Option<Delivery>,
    pub notices: Vec<Notice>,
}

/// Invoices plus the collaborators needed to process them. Dropping the
/// session discards everything.
pub struct Session {
    acquirer: Arc<TextAcquirer>,
    extractor: StructuredExtractor,
    dispatcher: Dispatcher,
    store: InvoiceStore,
    acquisition_timeout: Duration,
}

impl Session {
    pub fn new(
        acquirer: TextAcquirer,
        extractor: StructuredExtractor,
        dispatcher: Dispatcher,
        config: &FaturaConfig,
    ) -> Self {
        Self {
            acquirer: Arc::new(acquirer),
            extractor,
            dispatcher,
            store: InvoiceStore::new(),
            acquisition_timeout: config.acquisition.timeout(),
        }
    }

    /// Acquire, extract, register as pending and notify compliance.
    ///
    /// No invoice is created when acquisition times out or the model cannot
    /// be reached.
    pub async fn ingest(&mut self, bytes: Vec<u8>) -> Result<IngestReport> {
        let acquisition = Arc::clone(&self.acquirer)
            .spawn_acquire(bytes, self.acquisition_timeout)
            .await?;
        let mut notices = acquisition.advisories;

        if acquisition.text.is_empty() {
            notices.push(Notice::warning("Nenhum texto encontrado no documento"));
        }

        let extraction = self.extractor.extract(&acquisition.text).await?;

        match (&extraction.record, &extraction.parse_error) {
            (Some(record), _) => {
                notices.extend(record.review_issues().into_iter().map(Notice::warning));
            }
            (None, error) => {
                let reason = error.as_ref().map(|e| e.to_string()).unwrap_or_default();
                notices.push(Notice::error(format!(
                    "Resposta do modelo não pôde ser estruturada ({}); conteúdo bruto mantido",
                    reason
                )));
            }
        }

        let invoice = self
            .store
            .create(extraction.raw, extraction.record, acquisition.source);
        let id = invoice.id();
        let message = templates::received_for_compliance(invoice);
        info!(id, source = ?acquisition.source, "Invoice registered");

        let delivery = self.dispatcher.send(Channel::Compliance, &message).await;
        match &delivery {
            Delivery::Delivered => {
                notices.push(Notice::success(format!(
                    "Fatura #{} enviada para análise de conformidade.",
                    id
                )));
            }
            Delivery::Failed(reason) => {
                notices.push(Notice::warning(format!(
                    "Falha ao notificar a conferência: {}",
                    reason
                )));
                notices.push(Notice::success(format!("Fatura #{} registrada como pendente.", id)));
            }
        }

        Ok(IngestReport {
            invoice_id: id,
            source: acquisition.source,
            delivery,
            notices,
        })
    }

    pub async fn approve_compliance(&mut self, id: u64) -> Result<TransitionReport> {
        self.apply(id, Action::ApproveCompliance).await
    }

    pub async fn reject_compliance(&mut self, id: u64) -> Result<TransitionReport> {
        self.apply(id, Action::RejectCompliance).await
    }

    pub async fn pay(&mut self, id: u64) -> Result<TransitionReport> {
        self.apply(id, Action::Pay).await
    }

    pub async fn reject_payment(&mut self, id: u64) -> Result<TransitionReport> {
        self.apply(id, Action::RejectPayment).await
    }

    /// Apply `action` to invoice `id`. The new status is committed before any
    /// notification goes out, and a failed notification does not undo it.
    pub async fn apply(&mut self, id: u64, action: Action) -> Result<TransitionReport> {
        let invoice = self
            .store
            .get_mut(id)
            .ok_or(FaturaError::UnknownInvoice(id))?;

        let from = invoice.status();
        let to = invoice.apply(action).inspect_err(|e| warn!("{}", e))?;
        info!(id, %from, %to, "Invoice transitioned");

        let mut notices = Vec::new();
        let mut delivery = None;

        match action {
            Action::ApproveCompliance => {
                notices.push(Notice::success(format!(
                    "Fatura #{} aprovada quanto à conformidade.",
                    id
                )));
                let message = templates::forwarded_for_payment(invoice);
                let sent = self.dispatcher.send(Channel::Payment, &message).await;
                notices.push(match &sent {
                    Delivery::Delivered => Notice::info(format!("Fatura #{} enviada para o financeiro.", id)),
                    Delivery::Failed(reason) => {
                        Notice::warning(format!("Falha ao notificar o financeiro: {}", reason))
                    }
                });
                delivery = Some(sent);
            }
            Action::RejectCompliance => {
                notices.push(Notice::info(format!("Fatura #{} rejeitada na conferência.", id)));
            }
            Action::Pay => {
                notices.push(Notice::success(format!(
                    "Pagamento da Fatura #{} realizado com sucesso (simulado).",
                    id
                )));
            }
            Action::RejectPayment => {
                notices.push(Notice::info(format!("Fatura #{} rejeitada no pagamento.", id)));
            }
        }

        Ok(TransitionReport { invoice_id: id, from, to, delivery, notices })
    }

    pub fn invoice(&self, id: u64) -> Result<&Invoice> {
        self.store.get(id).ok_or(FaturaError::UnknownInvoice(id))
    }

    /// The most recently ingested invoice.
    pub fn current(&self) -> Option<&Invoice> {
        self.store.current()
    }

    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.store.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{PdfProcessor, TextRecognizer};
    use crate::acquisition::tests::{FakePdf, FakeRecognizer};
    use crate::error::{ExtractionError, OcrError, Stage, TransitionError};
    use crate::extraction::tests::ScriptedClient;
    use crate::models::config::{AcquisitionConfig, ExtractionConfig};
    use crate::notice::NoticeLevel;
    use crate::notify::tests::{Mode, RecordingNotifier, dispatcher};
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    const RECORD: &str = r#"{"tipo_documento": "boleto", "emitente_nome": "Alfa", "valor_total": 873.71}"#;

    struct Harness {
        session: Session,
        client: Arc<ScriptedClient>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness_with(client: Arc<ScriptedClient>, acquirer: TextAcquirer) -> Harness {
        let notifier = Arc::new(RecordingNotifier::default());
        let extractor = StructuredExtractor::new(client.clone(), &ExtractionConfig::default());
        let session = Session::new(
            acquirer,
            extractor,
            dispatcher(notifier.clone()),
            &FaturaConfig::default(),
        );
        Harness { session, client, notifier }
    }

    fn harness(answers: &[&str]) -> Harness {
        let acquirer = TextAcquirer::new(None, &AcquisitionConfig::default());
        harness_with(ScriptedClient::replying(answers), acquirer)
    }

    async fn ingested(answers: &[&str]) -> Harness {
        let mut h = harness(answers);
        h.session.ingest(b"FATURA 1\nTotal R$ 873,71".to_vec()).await.unwrap();
        h
    }

    fn status(h: &Harness, id: u64) -> InvoiceStatus {
        h.session.invoice(id).unwrap().status()
    }

    #[tokio::test]
    async fn test_ingest_registers_and_notifies_compliance() {
        let mut h = harness(&[RECORD]);
        let report = h.session.ingest(b"FATURA 1\nTotal R$ 873,71".to_vec()).await.unwrap();

        assert_eq!(report.invoice_id, 1);
        assert_eq!(report.delivery, Delivery::Delivered);
        assert_eq!(report.source, TextSource::PlainText);
        assert_eq!(status(&h, 1), InvoiceStatus::Pending);
        assert_eq!(h.session.current().map(Invoice::id), Some(1));

        let sent = h.notifier.sent_to("compliance-chat");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Fatura #1"));
        assert!(sent[0].contains("873.71"));
        assert!(h.notifier.sent_to("payment-chat").is_empty());
        assert!(report.notices.iter().any(|n| n.level == NoticeLevel::Success));
    }

    #[tokio::test]
    async fn test_unparseable_output_still_creates_invoice() {
        let mut h = harness(&["Tipo: boleto, valor 873,71", "ainda não é JSON"]);
        let report = h.session.ingest(b"boleto".to_vec()).await.unwrap();

        let invoice = h.session.invoice(report.invoice_id).unwrap();
        assert!(invoice.structured_data.is_none());
        assert_eq!(invoice.raw_extraction, "Tipo: boleto, valor 873,71");
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert!(report.notices.iter().any(|n| n.level == NoticeLevel::Error));

        let sent = h.notifier.sent_to("compliance-chat");
        assert!(sent[0].contains("Tipo: boleto, valor 873,71"));
    }

    #[tokio::test]
    async fn test_model_unreachable_creates_nothing() {
        let client = ScriptedClient::new(vec![Some(Err(ExtractionError::Transport("dns".into())))]);
        let acquirer = TextAcquirer::new(None, &AcquisitionConfig::default());
        let mut h = harness_with(client, acquirer);

        let err = h.session.ingest(b"boleto".to_vec()).await.unwrap_err();
        assert!(matches!(err, FaturaError::Extraction(ExtractionError::Transport(_))));
        assert_eq!(h.session.invoices().count(), 0);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_sends_one_payment_notification() {
        let mut h = ingested(&[RECORD]).await;
        let report = h.session.approve_compliance(1).await.unwrap();

        assert_eq!(report.from, InvoiceStatus::Pending);
        assert_eq!(report.to, InvoiceStatus::ComplianceApproved);
        assert_eq!(report.delivery, Some(Delivery::Delivered));
        assert_eq!(status(&h, 1), InvoiceStatus::ComplianceApproved);

        let sent = h.notifier.sent_to("payment-chat");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Fatura #1"));

        assert!(h.session.approve_compliance(1).await.is_err());
        assert_eq!(h.notifier.sent_to("payment-chat").len(), 1);
    }

    #[tokio::test]
    async fn test_pay_before_approval_is_refused() {
        let mut h = ingested(&[RECORD]).await;

        let first = h.session.pay(1).await.unwrap_err();
        let second = h.session.pay(1).await.unwrap_err();
        assert_eq!(status(&h, 1), InvoiceStatus::Pending);
        assert!(first.to_string().contains("must be compliance-approved before payment"));

        match (first, second) {
            (FaturaError::Transition(a), FaturaError::Transition(b)) => assert_eq!(a, b),
            other => panic!("unexpected errors: {:?}", other),
        }

        let err = h.session.reject_payment(1).await.unwrap_err();
        assert!(matches!(
            err,
            FaturaError::Transition(TransitionError::GuardViolation { action: Action::RejectPayment, .. })
        ));
        assert_eq!(status(&h, 1), InvoiceStatus::Pending);
        assert!(h.notifier.sent_to("payment-chat").is_empty());
    }

    #[tokio::test]
    async fn test_pay_after_approval_is_final() {
        let mut h = ingested(&[RECORD]).await;
        h.session.approve_compliance(1).await.unwrap();

        let report = h.session.pay(1).await.unwrap();
        assert_eq!(report.to, InvoiceStatus::Paid);
        assert_eq!(
            report.notices[0].message,
            "Pagamento da Fatura #1 realizado com sucesso (simulado)."
        );

        for action in Action::ALL {
            assert!(h.session.apply(1, action).await.is_err());
        }
        assert_eq!(status(&h, 1), InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_rejections() {
        let mut h = harness(&[RECORD, RECORD]);
        h.session.ingest(b"a".to_vec()).await.unwrap();
        h.session.ingest(b"b".to_vec()).await.unwrap();

        h.session.reject_compliance(1).await.unwrap();
        assert_eq!(status(&h, 1), InvoiceStatus::RejectedAtCompliance);

        h.session.approve_compliance(2).await.unwrap();
        h.session.reject_payment(2).await.unwrap();
        assert_eq!(status(&h, 2), InvoiceStatus::RejectedAtPayment);
        assert!(h.session.pay(2).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_transition() {
        let mut h = ingested(&[RECORD]).await;
        h.notifier.set_mode(Mode::Fail);

        let report = h.session.approve_compliance(1).await.unwrap();
        assert!(matches!(report.delivery, Some(Delivery::Failed(_))));
        assert_eq!(status(&h, 1), InvoiceStatus::ComplianceApproved);
        assert!(report.notices.iter().any(|n| n.level == NoticeLevel::Warning));
    }

    #[tokio::test]
    async fn test_failed_compliance_notification_keeps_invoice() {
        let mut h = harness(&[RECORD]);
        h.notifier.set_mode(Mode::Fail);

        let report = h.session.ingest(b"FATURA 1\nTotal R$ 873,71".to_vec()).await.unwrap();
        assert!(matches!(report.delivery, Delivery::Failed(_)));
        assert_eq!(status(&h, report.invoice_id), InvoiceStatus::Pending);
        assert_eq!(h.session.current().map(Invoice::id), Some(report.invoice_id));
        assert!(report.notices.iter().any(|n| {
            n.level == NoticeLevel::Warning && n.message.contains("Falha ao notificar a conferência")
        }));
    }

    #[tokio::test]
    async fn test_malformed_pdf_font_still_registers_invoice() {
        let bytes = crate::acquisition::pdf_fixtures::pdf_with_font_encoding("BogusEncoding");
        let mut h = harness(&[RECORD]);

        let report = h.session.ingest(bytes).await.unwrap();
        assert_eq!(report.source, TextSource::Empty);
        assert_eq!(status(&h, report.invoice_id), InvoiceStatus::Pending);
        assert_eq!(h.session.invoices().count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let mut h = ingested(&[RECORD]).await;
        assert!(matches!(h.session.pay(9).await, Err(FaturaError::UnknownInvoice(9))));
        assert!(matches!(h.session.invoice(0), Err(FaturaError::UnknownInvoice(0))));
    }

    #[tokio::test]
    async fn test_scanned_pdf_goes_through_ocr() {
        let recognizer = Arc::new(FakeRecognizer::default());
        let pdf = std::sync::Mutex::new(Some(FakePdf { text: Ok(String::new()), pages: 1, broken_page: None }));
        let acquirer = TextAcquirer::new(Some(recognizer.clone() as Arc<dyn TextRecognizer>), &AcquisitionConfig::default())
            .with_pdf_factory(Arc::new(move || -> Box<dyn PdfProcessor> {
                let taken = pdf.lock().ok().and_then(|mut p| p.take());
                Box::new(taken.unwrap_or(FakePdf { text: Ok(String::new()), pages: 0, broken_page: None }))
            }));
        let mut h = harness_with(ScriptedClient::replying(&[RECORD]), acquirer);

        let report = h.session.ingest(b"%PDF-1.7\n".to_vec()).await.unwrap();
        assert_eq!(report.source, TextSource::Ocr);
        assert!(report.notices[0].message.contains("OCR"));
        assert!(h.client.prompts.lock().unwrap()[0].user.ends_with("page 1"));
    }

    struct SlowRecognizer;

    impl TextRecognizer for SlowRecognizer {
        fn recognize(&self, _image: &DynamicImage) -> std::result::Result<String, OcrError> {
            std::thread::sleep(Duration::from_millis(1500));
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_acquisition_timeout_creates_nothing() {
        let config = AcquisitionConfig { timeout_secs: 1, ..Default::default() };
        let acquirer = TextAcquirer::new(Some(Arc::new(SlowRecognizer) as Arc<dyn TextRecognizer>), &config);
        let mut h = harness_with(ScriptedClient::replying(&[RECORD]), acquirer);
        h.session.acquisition_timeout = config.timeout();

        let png = {
            let mut bytes = Vec::new();
            DynamicImage::new_luma8(2, 2)
                .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
                .unwrap();
            bytes
        };
        let err = h.session.ingest(png).await.unwrap_err();
        assert!(matches!(err, FaturaError::Timeout { stage: Stage::Acquisition, .. }));
        assert_eq!(h.session.invoices().count(), 0);
        assert_eq!(h.client.calls(), 0);
    }
}
