//! Serving certificate for the console service, issued by cert-manager.

use super::Inputs;
use crate::constants::{APP_NAME, CERTIFICATE_ISSUER_NAME, CERTIFICATE_NAME, CERTIFICATE_SECRET_NAME};
use crate::crd::{Certificate, CertificateSpec, IssuerReference};

const DURATION: &str = "2160h";
const RENEW_BEFORE: &str = "720h";

#[must_use]
pub fn certificate(inputs: &Inputs<'_>) -> Certificate {
    let ns = inputs.namespace();
    let mut certificate = Certificate::new(
        CERTIFICATE_NAME,
        CertificateSpec {
            common_name: APP_NAME.to_string(),
            secret_name: CERTIFICATE_SECRET_NAME.to_string(),
            dns_names: vec![
                APP_NAME.to_string(),
                format!("{APP_NAME}.{ns}"),
                format!("{APP_NAME}.{ns}.svc"),
                format!("{APP_NAME}.{ns}.svc.cluster.local"),
            ],
            issuer_ref: IssuerReference {
                name: CERTIFICATE_ISSUER_NAME.to_string(),
                kind: "Issuer".to_string(),
            },
            duration: Some(DURATION.to_string()),
            renew_before: Some(RENEW_BEFORE.to_string()),
        },
    );
    certificate.metadata = inputs.metadata(CERTIFICATE_NAME);
    certificate
}
