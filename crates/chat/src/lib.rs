//! Chat-platform side of the recruitment bot.
//!
//! - **Body** (`body`) - named-section post model and its embed wire shape
//! - **Codec** (`codec`) - `Session` <-> post body projection
//! - **Policy** (`policy`) - which reactions join, leave, or stop
//! - **Store** (`store`) - live sessions, one lock per posted message
//! - **Events** (`events`) - inbound event model, dispatcher, and handlers
//! - **Gateway** (`gateway`) - platform client/transport seams and the event loop
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → RecruitmentHandler → Intent Parser → Codec → ChatClient::post_message
//!                          ↘ ReactionHandler → SessionStore lock → Attendance → Codec → ChatClient::edit_message
//! ```

pub mod body;
pub mod codec;
pub mod events;
pub mod gateway;
pub mod policy;
pub mod store;
