use crate::error::AppError;
use actix_web::http::Method;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

// 需要管理员令牌的路径前缀
const ADMIN_PREFIX: &str = "/api/v1/admin";

fn is_admin_path(path: &str) -> bool {
    path == ADMIN_PREFIX
        || path
            .strip_prefix(ADMIN_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Bearer-token guard for the operator API. Everything outside
/// `/api/v1/admin` passes through; an empty token disables the admin API.
pub struct AdminGuard {
    token: Rc<String>,
}

impl AdminGuard {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Rc::new(token.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminGuardService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminGuardService {
            service,
            token: self.token.clone(),
        }))
    }
}

pub struct AdminGuardService<S> {
    service: S,
    token: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AdminGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS || !is_admin_path(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        if self.token.is_empty() {
            let error = AppError::AuthError("Admin API is disabled".to_string());
            return Box::pin(async move { Err(error.into()) });
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let rejection = match token {
            Some(token) if token == self.token.as_str() => None,
            Some(_) => {
                log::warn!("Rejected admin request to {}: bad token", req.path());
                Some("Invalid admin token")
            }
            None => Some("Missing admin token"),
        };

        match rejection {
            None => {
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Some(msg) => {
                let error = AppError::AuthError(msg.to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test, web};

    async fn call(guard: AdminGuard, method: Method, path: &str, auth: Option<&str>) -> StatusCode {
        let app = actix_test::init_service(
            App::new()
                .wrap(guard)
                .default_service(web::to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let mut req = actix_test::TestRequest::default().method(method).uri(path);
        if let Some(auth) = auth {
            req = req.insert_header(("Authorization", auth));
        }
        match actix_test::try_call_service(&app, req.to_request()).await {
            Ok(res) => res.status(),
            Err(e) => e.as_response_error().status_code(),
        }
    }

    #[test]
    fn test_admin_path_matching() {
        assert!(is_admin_path("/api/v1/admin"));
        assert!(is_admin_path("/api/v1/admin/lotteries/3/draw"));
        assert!(!is_admin_path("/api/v1/administrator"));
        assert!(!is_admin_path("/api/v1/lotteries"));
    }

    #[actix_web::test]
    async fn test_guard_checks_bearer_token() {
        let path = "/api/v1/admin/lotteries/1/draw";
        assert_eq!(
            call(AdminGuard::new("s3cret"), Method::POST, path, Some("Bearer s3cret")).await,
            StatusCode::OK
        );
        assert_eq!(
            call(AdminGuard::new("s3cret"), Method::POST, path, Some("Bearer nope")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(AdminGuard::new("s3cret"), Method::POST, path, None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(AdminGuard::new("s3cret"), Method::OPTIONS, path, None).await,
            StatusCode::OK
        );
    }

    #[actix_web::test]
    async fn test_public_paths_and_disabled_admin() {
        assert_eq!(
            call(AdminGuard::new(""), Method::GET, "/api/v1/lotteries", None).await,
            StatusCode::OK
        );
        assert_eq!(
            call(
                AdminGuard::new(""),
                Method::POST,
                "/api/v1/admin/lotteries",
                Some("Bearer ")
            )
            .await,
            StatusCode::UNAUTHORIZED
        );
    }
}
