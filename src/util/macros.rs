// Copyright (c) 2023 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

/// Return an error from a handler returning a `ResponseActFuture`.
macro_rules! return_fut_err {
    ($result:expr) => {
        return Box::pin(actix::fut::ready(Err($result)))
    };
}

/// Unwrap a `Result` in a handler returning a `ResponseActFuture<_, Result<_, ServiceError>>`.
macro_rules! try_fut {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                return Box::pin(actix::fut::ready(Err($crate::errors::ServiceError::from(e))));
            }
        }
    };
}

pub(crate) use return_fut_err;
pub(crate) use try_fut;
