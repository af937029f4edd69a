pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod messages;
pub mod patients;
pub mod payments;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api",
            auth::router()
                .merge(appointments::router())
                .merge(patients::router())
                .merge(payments::router())
                .merge(messages::router())
                .merge(dashboard::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::login,
        auth::me,
        // Appointments
        appointments::create_appointment,
        appointments::list_appointments,
        appointments::booked_slots,
        appointments::book_appointment,
        appointments::get_appointment,
        appointments::update_appointment,
        appointments::update_status,
        // Patients
        patients::list_patients,
        patients::get_patient,
        patients::update_patient,
        // Payments
        payments::list_payments,
        payments::get_payment,
        payments::create_payment,
        payments::update_payment_status,
        // Messages
        messages::conversation_messages,
        messages::list_conversations,
        messages::create_conversation,
        messages::send_message,
        // Dashboard
        dashboard::dashboard_stats,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::appointment::Appointment,
            crate::models::patient::Patient,
            crate::models::payment::Payment,
            crate::models::conversation::Conversation,
            crate::models::message::Message,
            // Route request/response types
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            appointments::CreateAppointmentRequest,
            appointments::BookAppointmentRequest,
            appointments::UpdateAppointmentRequest,
            appointments::UpdateStatusRequest,
            appointments::BookedSlot,
            appointments::BookedSlotsResponse,
            patients::PatientSummary,
            patients::UpdatePatientRequest,
            payments::CreatePaymentRequest,
            payments::UpdatePaymentStatusRequest,
            messages::CreateConversationRequest,
            messages::SendMessageRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Admin authentication"),
        (name = "Appointments", description = "Appointment booking and management"),
        (name = "Patients", description = "Patient records"),
        (name = "Payments", description = "Payment records"),
        (name = "Messages", description = "Patient messaging"),
        (name = "Dashboard", description = "Aggregated statistics"),
    )
)]
pub struct ApiDoc;
