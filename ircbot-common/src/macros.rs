#[macro_export]
macro_rules! ok_or_break {
    ($expression:expr) => {
        match $expression {
            Ok(v) => v,
            Err(_) => break,
        }
    };
}

#[macro_export]
macro_rules! ok_or_continue {
    ($expression:expr) => {
        match $expression {
            Ok(v) => v,
            Err(_) => continue,
        }
    };
}

/// Logs an internal failure. Anything reported through this is something an operator should look
/// at, as opposed to a user typing a command wrong.
#[macro_export]
macro_rules! err {
    ($($t:tt)*) => {{
        let msg = format!($($t)*);
        $crate::tracing::error!("Error: {}", &msg);
    }}
}

#[cfg(test)]
mod tests {
    #[test]
    fn ok_or_continue_skips_errors() {
        let items: Vec<Result<u32, ()>> = vec![Ok(1), Err(()), Ok(3)];
        let mut seen = vec![];
        for item in items {
            let v = ok_or_continue!(item);
            seen.push(v);
        }
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn ok_or_break_stops_at_first_error() {
        let items: Vec<Result<u32, ()>> = vec![Ok(1), Err(()), Ok(3)];
        let mut seen = vec![];
        for item in items {
            let v = ok_or_break!(item);
            seen.push(v);
        }
        assert_eq!(seen, vec![1]);
    }
}
