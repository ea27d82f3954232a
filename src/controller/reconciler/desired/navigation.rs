//! Navigation objects: the shared NavConfiguration and the cluster-scoped
//! OpenShift ConsoleLink pointing at the console.

use super::Inputs;
use crate::constants::{CONSOLE_LINK_PREFIX, NAV_CONFIG_NAME};
use crate::crd::{
    About, ApplicationMenu, ConsoleLink, ConsoleLinkSpec, NavConfiguration,
    NavConfigurationSpec, NavItem,
};

const PRODUCT_NAME: &str = "Octopilot Platform";

/// Licenses accepted for a platform release, e.g. `4.0` -> `L-OCTO-CP40`
fn licenses_for(version: &str) -> Vec<String> {
    let compact: String = version
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .concat()
        .to_ascii_uppercase();
    vec![
        format!("L-OCTO-CP{compact}"),
        format!("L-OCTO-CONSOLE-{compact}"),
    ]
}

fn item(id: &str, label: &str, url: String, service_name: &str, parent_id: Option<&str>) -> NavItem {
    NavItem {
        id: id.to_string(),
        label: label.to_string(),
        url,
        target: None,
        icon_url: None,
        service_name: Some(service_name.to_string()),
        parent_id: parent_id.map(str::to_string),
    }
}

/// NavConfiguration entries contributed by the console
#[must_use]
pub fn nav_configuration(inputs: &Inputs<'_>) -> NavConfiguration {
    let settings = &inputs.settings;
    let base = settings.ingress_path.trim_end_matches('/');
    let service = settings.service_name.as_str();

    let nav_items = vec![
        item("console-home", "Home", format!("{base}/"), service, None),
        item("console-administer", "Administer", format!("{base}/administer"), service, None),
        item(
            "console-identity-access",
            "Identity and access",
            format!("{base}/administer/identity-access"),
            service,
            Some("console-administer"),
        ),
    ];

    let mut nav = NavConfiguration::new(
        NAV_CONFIG_NAME,
        NavConfigurationSpec {
            nav_items,
            about: About {
                logo_url: Some(format!("{base}/graphics/logo.svg")),
                copyright: Some(format!("© {PRODUCT_NAME}")),
                version: Some(settings.cloud_pak_version.clone()),
                licenses: licenses_for(&settings.cloud_pak_version),
            },
        },
    );
    nav.metadata = inputs.metadata(NAV_CONFIG_NAME);
    nav
}

/// Cluster-scoped name of the ConsoleLink for an instance namespace
#[must_use]
pub fn console_link_name(namespace: &str) -> String {
    format!("{CONSOLE_LINK_PREFIX}-{namespace}")
}

/// ConsoleLink into the console, served on `console_host`
#[must_use]
pub fn console_link(inputs: &Inputs<'_>, console_host: &str) -> ConsoleLink {
    let name = console_link_name(inputs.namespace());
    let base = format!(
        "https://{console_host}{}",
        inputs.settings.ingress_path.trim_end_matches('/')
    );
    let mut link = ConsoleLink::new(
        &name,
        ConsoleLinkSpec {
            href: base.clone(),
            text: PRODUCT_NAME.to_string(),
            location: "ApplicationMenu".to_string(),
            application_menu: Some(ApplicationMenu {
                section: PRODUCT_NAME.to_string(),
                image_url: Some(format!("{base}/graphics/logo.svg")),
            }),
        },
    );
    link.metadata = inputs.metadata(&name);
    link.metadata.namespace = None;
    link
}
