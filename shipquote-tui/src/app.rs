use std::sync::Arc;

use shipquote_core::{
    model::{QuoteResponse, ServiceCode},
    service::{HealthSnapshot, QuoteEngine, ServiceSummary},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    QuoteForm,
    QuoteView,
    Services,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Address,
    Area,
}

pub(crate) struct App {
    pub engine: Arc<QuoteEngine>,

    pub screen: Screen,
    pub focus: Field,
    pub address_input: String,
    pub area_input: String,

    pub response: Option<QuoteResponse>,

    pub services: Vec<ServiceSummary>,
    pub special_zones: Vec<String>,
    pub service_list_index: usize,

    pub health: HealthSnapshot,

    pub is_loading: bool,
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl App {
    pub(crate) fn new(engine: Arc<QuoteEngine>) -> Self {
        let health = engine.status();
        let listing = engine.services();
        Self {
            engine,
            screen: Screen::QuoteForm,
            focus: Field::Address,
            address_input: String::new(),
            area_input: String::new(),
            response: None,
            services: listing.services,
            special_zones: listing.special_zones,
            service_list_index: 0,
            health,
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    pub(crate) fn refresh_status(&mut self) {
        self.health = self.engine.status();
    }

    pub(crate) fn refresh_services(&mut self) {
        let listing = self.engine.services();
        self.services = listing.services;
        self.special_zones = listing.special_zones;
        if self.service_list_index >= self.services.len() {
            self.service_list_index = self.services.len().saturating_sub(1);
        }
    }

    pub(crate) fn focused_input(&mut self) -> &mut String {
        match self.focus {
            Field::Address => &mut self.address_input,
            Field::Area => &mut self.area_input,
        }
    }

    pub(crate) fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Address => Field::Area,
            Field::Area => Field::Address,
        };
    }

    /// Code and new enabled flag for the highlighted service.
    pub(crate) fn current_toggle(&self) -> Option<(ServiceCode, bool)> {
        self.services
            .get(self.service_list_index)
            .map(|service| (service.code.clone(), !service.enabled))
    }

    pub(crate) fn clear_messages(&mut self) {
        self.error_message = None;
        self.info_message = None;
    }
}
