//! Cart route handlers.
//!
//! All handlers require a session token. Mutations answer with the updated,
//! hydrated cart; clients are free to ignore the body and re-fetch.

use axum::{
    Json,
    extract::{Query, State},
};
use cartsync_core::{Cart, Quantity, QuantityError, UserId, VariantId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{ApiError, Result};
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Query for `GET /cart`.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub id: UserId,
}

/// Body for single-line `POST` and `PATCH`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub user_id: UserId,
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Body for `POST /cart`: a single line, or an anonymous cart to merge.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddRequest {
    Merge { cart: Cart },
    Line(LineRequest),
}

/// Body for `DELETE /cart`; without `variantId` the whole cart is cleared.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

/// Return the user's cart, hydrated from the catalog.
#[instrument(skip(state, session), fields(user_id = %query.id))]
pub async fn show(
    State(state): State<AppState>,
    session: RequireSession,
    Query(query): Query<CartQuery>,
) -> Result<Json<Cart>> {
    session.require_user(&query.id)?;
    let cart = state.cart(&query.id).await;
    Ok(Json(hydrate(&state, &cart)))
}

/// Add units of one variant, or merge an anonymous cart.
#[instrument(skip(state, session, body))]
pub async fn add(
    State(state): State<AppState>,
    session: RequireSession,
    Json(body): Json<AddRequest>,
) -> Result<Json<Cart>> {
    match body {
        AddRequest::Line(line) => {
            session.require_user(&line.user_id)?;
            let quantity = quantity(line.quantity)?;
            check_variant(&state, line.variant_id)?;

            let cart = state
                .update_cart(&line.user_id, |cart| {
                    cart.add(line.variant_id, quantity).map_err(quantity_error)
                })
                .await?;
            tracing::info!(user_id = %line.user_id, variant_id = %line.variant_id, quantity = quantity.get(), "Added to cart");
            Ok(Json(hydrate(&state, &cart)))
        }
        AddRequest::Merge { cart: items } => {
            let RequireSession(user_id) = session;
            for line in &items {
                check_variant(&state, line.variant_id())?;
            }

            let cart = state
                .update_cart(&user_id, |cart| {
                    items
                        .lines()
                        .iter()
                        .try_for_each(|line| cart.add(line.variant_id(), line.quantity()))
                        .map_err(quantity_error)
                })
                .await?;
            tracing::info!(user_id = %user_id, lines = items.len(), "Merged anonymous cart");
            Ok(Json(hydrate(&state, &cart)))
        }
    }
}

/// Set the absolute quantity of one variant; 0 removes it.
#[instrument(skip(state, session, body), fields(user_id = %body.user_id, variant_id = %body.variant_id))]
pub async fn update(
    State(state): State<AppState>,
    session: RequireSession,
    Json(body): Json<LineRequest>,
) -> Result<Json<Cart>> {
    session.require_user(&body.user_id)?;

    let cart = if body.quantity == 0 {
        state
            .update_cart(&body.user_id, |cart| {
                cart.remove(body.variant_id);
                Ok::<_, ApiError>(())
            })
            .await?
    } else {
        let quantity = quantity(body.quantity)?;
        check_variant(&state, body.variant_id)?;
        state
            .update_cart(&body.user_id, |cart| {
                cart.set_quantity(body.variant_id, quantity);
                Ok::<_, ApiError>(())
            })
            .await?
    };

    Ok(Json(hydrate(&state, &cart)))
}

/// Remove one variant, or clear the cart.
#[instrument(skip(state, session, body), fields(user_id = %body.user_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: RequireSession,
    Json(body): Json<RemoveRequest>,
) -> Result<Json<Cart>> {
    session.require_user(&body.user_id)?;

    let cart = state
        .update_cart(&body.user_id, |cart| {
            match body.variant_id {
                Some(variant_id) => {
                    cart.remove(variant_id);
                }
                None => cart.clear(),
            }
            Ok::<_, ApiError>(())
        })
        .await?;

    Ok(Json(hydrate(&state, &cart)))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn hydrate(state: &AppState, cart: &Cart) -> Cart {
    Cart::from_lines(cart.lines().iter().map(|line| state.catalog().hydrate(line)))
}

fn check_variant(state: &AppState, variant_id: VariantId) -> Result<()> {
    if state.catalog().accepts(variant_id) {
        Ok(())
    } else {
        Err(ApiError::InvalidVariant)
    }
}

fn quantity(value: u32) -> Result<Quantity> {
    Quantity::new(value).map_err(quantity_error)
}

fn quantity_error(err: QuantityError) -> ApiError {
    match err {
        QuantityError::Zero => ApiError::BadRequest("Quantity must be at least 1".to_string()),
        QuantityError::Overflow => ApiError::Unprocessable("Quantity is too large".to_string()),
    }
}
