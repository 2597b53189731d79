use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};

// 通用 HTTP 响应封装 / Generic HTTP response helpers

// 通用响应（结构体自动转 JSON，失败则原样文本）
// Generic response: auto JSON from struct, fallback to text
pub fn respond_any<T: serde::Serialize + std::fmt::Debug>(
    code: StatusCode,
    data: T,
) -> HttpResponse {
    let code_u16 = code.as_u16();
    if (300..=399).contains(&code_u16) {
        let loc = match serde_json::to_value(&data) {
            Ok(serde_json::Value::String(s)) => s,
            Ok(v) => v.to_string(),
            Err(_) => format!("{:?}", data),
        };
        return HttpResponse::build(code)
            .insert_header((header::LOCATION, loc))
            .finish();
    }
    match serde_json::to_value(&data) {
        Ok(v) => HttpResponse::build(code).json(v),
        Err(_) => HttpResponse::build(code)
            .content_type("text/plain; charset=utf-8")
            .body(format!("{:?}", data)),
    }
}

#[cfg(test)]
mod tests {
    use super::respond_any;
    use actix_web::http::StatusCode;

    #[test]
    fn test_respond_any_json() {
        let resp = respond_any(StatusCode::OK, serde_json::json!({"ok": true}));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_respond_any_redirect_sets_location() {
        let resp = respond_any(StatusCode::FOUND, "/v1/health");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert!(resp.headers().contains_key(actix_web::http::header::LOCATION));
    }
}
