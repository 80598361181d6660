//! Request and object level authorization.
//!
//! A policy answers two questions: may this requester attempt the method at
//! all, and may they apply it to a particular object (identified by its
//! owner). Routers run [`guard`] as a route layer so the request level
//! check happens before the body is parsed; handlers call [`check_object`]
//! once the target is known. A failed check is a 401 for anonymous
//! requesters and a 403 otherwise.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::web::error::AppError;
use crate::web::middleware::auth::Requester;
use crate::web::models::AuthenticatedUser;

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

pub trait Permission {
    fn has_permission(&self, _method: &Method, _requester: Option<&AuthenticatedUser>) -> bool {
        true
    }

    fn has_object_permission(
        &self,
        _method: &Method,
        _requester: Option<&AuthenticatedUser>,
        _owner_id: i32,
    ) -> bool {
        true
    }
}

/// Reads for everyone, writes for staff.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAdminOrReadOnly;

impl Permission for IsAdminOrReadOnly {
    fn has_permission(&self, method: &Method, requester: Option<&AuthenticatedUser>) -> bool {
        is_safe_method(method) || requester.is_some_and(|user| user.is_staff)
    }
}

/// Reads for everyone, writes for authenticated users, object writes for the owner.
///
/// DELETE skips the ownership check, so any authenticated user may delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAuthorOrReadOnly;

impl Permission for IsAuthorOrReadOnly {
    fn has_permission(&self, method: &Method, requester: Option<&AuthenticatedUser>) -> bool {
        is_safe_method(method) || requester.is_some()
    }

    fn has_object_permission(
        &self,
        method: &Method,
        requester: Option<&AuthenticatedUser>,
        owner_id: i32,
    ) -> bool {
        is_safe_method(method)
            || *method == Method::DELETE
            || requester.is_some_and(|user| user.id == owner_id)
    }
}

/// Grants access when either policy does. At object level each side must
/// also pass its own request level check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Either<A, B>(pub A, pub B);

impl<A: Permission, B: Permission> Permission for Either<A, B> {
    fn has_permission(&self, method: &Method, requester: Option<&AuthenticatedUser>) -> bool {
        self.0.has_permission(method, requester) || self.1.has_permission(method, requester)
    }

    fn has_object_permission(
        &self,
        method: &Method,
        requester: Option<&AuthenticatedUser>,
        owner_id: i32,
    ) -> bool {
        (self.0.has_permission(method, requester)
            && self.0.has_object_permission(method, requester, owner_id))
            || (self.1.has_permission(method, requester)
                && self.1.has_object_permission(method, requester, owner_id))
    }
}

/// Policy for recipe endpoints: staff or the author may write.
pub type RecipePolicy = Either<IsAdminOrReadOnly, IsAuthorOrReadOnly>;

pub const RECIPE_POLICY: RecipePolicy = Either(IsAdminOrReadOnly, IsAuthorOrReadOnly);

fn denied(requester: Option<&AuthenticatedUser>) -> AppError {
    match requester {
        None => AppError::Unauthorized("Authentication credentials were not provided.".to_string()),
        Some(_) => {
            AppError::Forbidden("You do not have permission to perform this action.".to_string())
        }
    }
}

pub fn check<P: Permission>(
    policy: &P,
    method: &Method,
    requester: Option<&AuthenticatedUser>,
) -> Result<(), AppError> {
    if policy.has_permission(method, requester) {
        Ok(())
    } else {
        Err(denied(requester))
    }
}

/// Route layer applying the request level check of `P`.
pub async fn guard<P: Permission + Default>(
    requester: Requester,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&P::default(), req.method(), requester.user())?;
    Ok(next.run(req).await)
}

pub fn check_object<P: Permission>(
    policy: &P,
    method: &Method,
    requester: Option<&AuthenticatedUser>,
    owner_id: i32,
) -> Result<(), AppError> {
    if policy.has_object_permission(method, requester, owner_id) {
        Ok(())
    } else {
        Err(denied(requester))
    }
}
